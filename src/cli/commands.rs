use std::io::Write;

use anyhow::Context;
use serde::Serialize;
use serde_json::json;

use versiondb::db::Database;
use versiondb::model::{
    ContentHash, EntityKind, ModelError, NewVersion, Repository, Version, VersionId, VersionSource,
};
use versiondb::pipeline::{self, DependencyInfo, Resolution, VersionUri};

use super::*;

pub fn run_command(
    db: &Database,
    command: Command,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Command::List => cmd_list(db, format, out),
        Command::Create(args) => cmd_create(db, args, format, out),
        Command::Show(args) => cmd_show(db, args, format, out),
        Command::Files(args) => cmd_files(db, args, format, out),
        Command::AddFile(args) => cmd_add_file(db, args, format, out),
        Command::AddVersion(args) => cmd_add_version(db, args, format, out),
        Command::Versions(args) => cmd_versions(db, args, format, out),
        Command::Lineage(args) => cmd_lineage(db, args, format, out),
        Command::Resolve(args) => cmd_resolve(db, args, format, out),
    }
}

fn write_json(out: &mut dyn Write, value: &impl Serialize) -> anyhow::Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

fn plural(count: usize, word: &str) -> String {
    if count == 1 {
        format!("{count} {word}")
    } else {
        format!("{count} {word}s")
    }
}

fn version_line(v: &Version) -> String {
    format!(
        "  v{}  hash:{}  [{}]  {}",
        v.version_number,
        v.hash.short(),
        v.status,
        v.kind
    )
}

fn cmd_list(db: &Database, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let repo = db.repository();
    let mut rows = Vec::new();
    for collection in db.collections(false)? {
        let files = repo.list_files(&collection.id, false)?.len();
        rows.push((collection, files));
    }

    if format == OutputFormat::Json {
        let value: Vec<_> = rows
            .iter()
            .map(|(c, files)| json!({ "name": c.name, "id": c.id, "status": c.status, "files": files }))
            .collect();
        return write_json(out, &value);
    }

    if rows.is_empty() {
        writeln!(out, "No collections found.")?;
        return Ok(());
    }
    for (collection, files) in &rows {
        writeln!(
            out,
            "  {}  ({})  [{}]",
            collection.name,
            plural(*files, "file"),
            collection.status
        )?;
    }
    Ok(())
}

fn cmd_create(db: &Database, args: CreateArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let collection = versiondb::model::Collection::new(args.name)
        .with_description(args.description.unwrap_or_default())
        .with_project(args.project.unwrap_or_default())
        .with_owner(args.owner.unwrap_or_default());
    let collection = db.create_collection(collection)?;

    match format {
        OutputFormat::Json => write_json(out, &collection),
        OutputFormat::Text => {
            writeln!(out, "Created collection '{}' ({})", collection.name, collection.id)?;
            Ok(())
        }
    }
}

fn cmd_show(db: &Database, args: ShowArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let repo = db.repository();
    let collection = db.collection(&args.name)?;
    let mut files = Vec::new();
    for file in collection.list_children(repo, false)? {
        let latest = repo.latest_version(&file.id)?;
        files.push((file, latest));
    }

    if format == OutputFormat::Json {
        let value = json!({
            "collection": collection,
            "files": files
                .iter()
                .map(|(f, latest)| json!({
                    "name": f.name,
                    "id": f.id,
                    "latest": latest.as_ref().map(|v| v.version_number),
                }))
                .collect::<Vec<_>>(),
        });
        return write_json(out, &value);
    }

    writeln!(out, "Name:        {}", collection.name)?;
    writeln!(out, "Id:          {}", collection.id)?;
    writeln!(out, "Description: {}", collection.description)?;
    writeln!(out, "Project:     {}", collection.project)?;
    writeln!(out, "Owner:       {}", collection.owner)?;
    writeln!(out, "Status:      {}", collection.status)?;
    writeln!(out, "Files:       {}", files.len())?;
    for (file, latest) in &files {
        match latest {
            Some(v) => writeln!(out, "  - {} (v{})", file.name, v.version_number)?,
            None => writeln!(out, "  - {} (no versions)", file.name)?,
        }
    }
    Ok(())
}

fn cmd_files(db: &Database, args: FilesArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let repo = db.repository();
    let collection = db.collection(&args.collection)?;
    let mut rows = Vec::new();
    for file in collection.list_children(repo, false)? {
        let versions = file.list_versions(repo, false)?.len();
        rows.push((file, versions));
    }

    if format == OutputFormat::Json {
        let value: Vec<_> = rows
            .iter()
            .map(|(f, versions)| json!({ "name": f.name, "id": f.id, "status": f.status, "versions": versions }))
            .collect();
        return write_json(out, &value);
    }

    if rows.is_empty() {
        writeln!(out, "No files in collection '{}'.", args.collection)?;
        return Ok(());
    }
    for (file, versions) in &rows {
        writeln!(
            out,
            "  {}  ({})  [{}]",
            file.name,
            plural(*versions, "version"),
            file.status
        )?;
    }
    Ok(())
}

fn cmd_add_file(db: &Database, args: AddFileArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let collection = db.collection(&args.collection)?;
    let file = collection.add_child(
        db.repository(),
        &args.name,
        args.description.as_deref().unwrap_or_default(),
        args.owner.as_deref().unwrap_or_default(),
    )?;

    match format {
        OutputFormat::Json => write_json(out, &file),
        OutputFormat::Text => {
            writeln!(
                out,
                "Added file '{}' to collection '{}' ({})",
                file.name, collection.name, file.id
            )?;
            Ok(())
        }
    }
}

fn cmd_add_version(
    db: &Database,
    args: AddVersionArgs,
    format: OutputFormat,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let file = db.file(&args.collection, &args.file)?;
    let algorithm = args.algorithm;
    let source = VersionSource::from_parts(args.path, args.hash.map(|h| ContentHash::new(h, algorithm)))?;

    let mut new = NewVersion::new(source)
        .kind(args.kind)
        .address(args.address)
        .transformer(args.transformer);
    if let Some(from) = args.from {
        new = new.derived_from(VersionId::new(from));
    }
    let version = file
        .add_version(db.repository(), db.gateway(), new)
        .with_context(|| format!("cannot add version to '{}'", file.name))?;

    match format {
        OutputFormat::Json => write_json(out, &version),
        OutputFormat::Text => {
            writeln!(
                out,
                "Added v{} of '{}' ({})  hash:{}",
                version.version_number,
                file.name,
                version.id,
                version.hash.short()
            )?;
            Ok(())
        }
    }
}

fn cmd_versions(db: &Database, args: VersionsArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let file = db.file(&args.collection, &args.file)?;
    let versions = file.list_versions(db.repository(), args.all)?;

    if format == OutputFormat::Json {
        return write_json(out, &versions);
    }
    if versions.is_empty() {
        writeln!(out, "No versions for '{}'.", args.file)?;
        return Ok(());
    }
    for v in &versions {
        writeln!(out, "{}", version_line(v))?;
    }
    Ok(())
}

fn cmd_lineage(db: &Database, args: LineageArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let id = VersionId::new(args.version_id);
    if db.repository().get_version(&id)?.is_none() {
        return Err(ModelError::not_found(EntityKind::Version, id.as_str()).into());
    }
    let chain = db.lineage().lineage(&id, args.depth)?;

    if format == OutputFormat::Json {
        return write_json(out, &chain);
    }
    for v in &chain {
        writeln!(out, "{}  {}", version_line(v), v.id)?;
    }
    Ok(())
}

fn cmd_resolve(db: &Database, args: ResolveArgs, format: OutputFormat, out: &mut dyn Write) -> anyhow::Result<()> {
    let uri: VersionUri = args.uri.parse()?;

    if args.recorded.is_some() {
        let status = pipeline::dependency_status(db.repository(), &uri, args.recorded.as_deref())?;
        return match format {
            OutputFormat::Json => write_json(out, &json!({ "uri": uri.to_string(), "status": status })),
            OutputFormat::Text => {
                writeln!(out, "{uri}: {status}")?;
                Ok(())
            }
        };
    }

    let version = match pipeline::resolve(db.repository(), &uri)? {
        Resolution::Found(version) => version,
        Resolution::NotFound => {
            return Err(ModelError::not_found(EntityKind::Version, uri.to_string()).into());
        }
    };

    match format {
        OutputFormat::Json => write_json(out, &DependencyInfo::new(&uri, &version)),
        OutputFormat::Text => {
            writeln!(out, "{uri}")?;
            writeln!(out, "{}  {}", version_line(&version), version.id)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn run(db: &Database, args: &[&str]) -> anyhow::Result<String> {
        let mut argv = vec!["versiondb"];
        argv.extend_from_slice(args);
        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        run_command(db, cli.command, cli.format, &mut out)?;
        Ok(String::from_utf8(out)?)
    }

    fn setup() -> Database {
        let db = Database::in_memory().unwrap();
        run(&db, &["create", "cifar", "-o", "alice", "-p", "vision"]).unwrap();
        run(&db, &["add-file", "cifar", "train.csv"]).unwrap();
        db
    }

    #[test]
    fn test_list_output() {
        let db = Database::in_memory().unwrap();
        assert_eq!(run(&db, &["list"]).unwrap(), "No collections found.\n");

        run(&db, &["create", "cifar"]).unwrap();
        run(&db, &["add-file", "cifar", "a"]).unwrap();
        assert_eq!(run(&db, &["list"]).unwrap(), "  cifar  (1 file)  [ACTIVE]\n");

        run(&db, &["add-file", "cifar", "b"]).unwrap();
        assert_eq!(run(&db, &["list"]).unwrap(), "  cifar  (2 files)  [ACTIVE]\n");
    }

    #[test]
    fn test_show_and_files() {
        let db = setup();
        run(&db, &["add-version", "cifar", "train.csv", "--hash", "0123456789abcdef"]).unwrap();

        let show = run(&db, &["show", "cifar"]).unwrap();
        assert!(show.contains("Owner:       alice"));
        assert!(show.contains("Files:       1"));
        assert!(show.contains("  - train.csv (v1)"));

        let files = run(&db, &["files", "cifar"]).unwrap();
        assert_eq!(files, "  train.csv  (1 version)  [ACTIVE]\n");
    }

    #[test]
    fn test_versions_output() {
        let db = setup();
        assert_eq!(
            run(&db, &["versions", "cifar", "train.csv"]).unwrap(),
            "No versions for 'train.csv'.\n"
        );

        run(&db, &["add-version", "cifar", "train.csv", "--hash", "0123456789abcdef", "--kind", "s3"]).unwrap();
        assert_eq!(
            run(&db, &["versions", "cifar", "train.csv"]).unwrap(),
            "  v1  hash:01234567  [COMMITTED]  S3\n"
        );
    }

    #[test]
    fn test_not_found_is_an_error() {
        let db = setup();
        let err = run(&db, &["show", "mnist"]).unwrap_err();
        assert!(err.to_string().contains("not found"));
        assert!(run(&db, &["versions", "cifar", "nope"]).is_err());
        assert!(run(&db, &["lineage", "ghost"]).is_err());
        assert!(run(&db, &["resolve", "versiondb://cifar/train.csv"]).is_err());
    }

    #[test]
    fn test_duplicate_file_is_an_error() {
        let db = setup();
        assert!(run(&db, &["add-file", "cifar", "train.csv"]).is_err());
    }

    #[test]
    fn test_add_version_from_path_is_loadable_after_reopen() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join(".versiondb/metadata.db");
        let source = dir.path().join("d.csv");
        std::fs::write(&source, b"x,y\n").unwrap();

        let db = Database::open(&db_path).unwrap();
        run(&db, &["create", "c"]).unwrap();
        run(&db, &["add-file", "c", "f"]).unwrap();
        run(&db, &["add-version", "c", "f", "--path", source.to_str().unwrap()]).unwrap();
        db.close().unwrap();
        drop(db);

        let db = Database::open(&db_path).unwrap();
        let version = db.file("c", "f").unwrap().latest_version(db.repository()).unwrap();
        assert!(db.integrity().verify_version(&version).unwrap());
        let out = dir.path().join("out.csv");
        version
            .load(db.gateway(), &out, &versiondb::gateway::TransferOptions::new())
            .unwrap();
        assert_eq!(std::fs::read(out).unwrap(), b"x,y\n");
    }

    #[test]
    fn test_add_version_needs_one_source() {
        let db = setup();
        assert!(run(&db, &["add-version", "cifar", "train.csv"]).is_err());
        assert!(run(&db, &["add-version", "cifar", "train.csv", "--path", "x", "--hash", "y"]).is_err());
    }

    #[test]
    fn test_lineage_and_resolve() {
        let db = setup();
        let v1: Version = serde_json::from_str(
            &run(&db, &["--format", "json", "add-version", "cifar", "train.csv", "--hash", "aaaa1111"]).unwrap(),
        )
        .unwrap();
        let v2: Version = serde_json::from_str(
            &run(
                &db,
                &["--format", "json", "add-version", "cifar", "train.csv", "--hash", "bbbb2222", "--from", v1.id.as_str()],
            )
            .unwrap(),
        )
        .unwrap();

        let lineage = run(&db, &["lineage", v2.id.as_str()]).unwrap();
        let lines: Vec<_> = lineage.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("  v2  hash:bbbb2222"));
        assert!(lines[1].starts_with("  v1  hash:aaaa1111"));

        let resolved = run(&db, &["resolve", "versiondb://cifar/train.csv@v1"]).unwrap();
        assert!(resolved.contains("  v1  hash:aaaa1111  [COMMITTED]  LOCAL"));

        let status = run(&db, &["resolve", "versiondb://cifar/train.csv", "--recorded", "aaaa1111"]).unwrap();
        assert_eq!(status, "versiondb://cifar/train.csv: modified\n");
    }
}
