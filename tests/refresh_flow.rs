use class_index::config::IndexConfig;
use class_index::index::ClassIndex;
use class_index::introspect::Introspect;
use class_index::locate::FixedLocator;
use class_index::model::{Descriptor, MemberKind, Origin};
use class_index::refresh::{RefreshCoordinator, RefreshOutcome, StaticClasspath};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "class_index_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    use std::io::Write;
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

const WIDGET_VERBOSE: &str = r#"Classfile /tmp/org/example/Widget.class
  Compiled from "Widget.java"
public class org.example.Widget extends org.example.Base
  minor version: 0
  major version: 52
{
  public org.example.Widget(java.lang.String);
    descriptor: (Ljava/lang/String;)V
    MethodParameters:
      Name                           Flags
      label
  public void resize(int, int);
    descriptor: (II)V
    Code:
      stack=0, locals=3, args_size=3
    MethodParameters:
      Name                           Flags
      width                          final
      height
  public int size();
    descriptor: ()I
}
SourceFile: "Widget.java"
"#;

const BASE_VERBOSE: &str = r#"Classfile /tmp/org/example/Base.class
  Compiled from "Base.java"
public abstract class org.example.Base
{
  protected int revision;
    descriptor: I
}
"#;

/// Serves real archive listings and canned verbose descriptions.
struct CannedJavap;

impl Introspect for CannedJavap {
    fn list_archive_entries(&self, archive: &Path) -> Vec<String> {
        class_index::archive::list_entries(archive).unwrap_or_default()
    }

    fn introspect_classes(&self, _classpath: &Path, class_names: &[String], _verbose: bool) -> String {
        class_names
            .iter()
            .filter_map(|name| match name.as_str() {
                "org.example.Widget" => Some(WIDGET_VERBOSE),
                "org.example.Base" => Some(BASE_VERBOSE),
                _ => None,
            })
            .collect()
    }
}

#[test]
fn refresh_indexes_directory_and_archive_with_parameter_names() -> anyhow::Result<()> {
    let base = temp_dir("refresh_flow");
    let classes = base.join("classes");
    write_file(&classes.join("org/example/Widget.class"), "")?;
    write_file(&classes.join("org/example/Widget$Listener.class"), "")?;
    write_jar(
        &base.join("lib/base.jar"),
        &[
            ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
            ("org/example/Base.class", b""),
            ("org/example/Unlisted.class", b""),
        ],
    )?;

    let index = Arc::new(ClassIndex::new());
    let config = IndexConfig {
        recover_parameter_names: true,
        ..IndexConfig::default()
    };
    let coordinator = RefreshCoordinator::new(
        Arc::clone(&index),
        Arc::new(CannedJavap),
        Arc::new(FixedLocator(None)),
        config,
    );

    let source = StaticClasspath::parse(
        &format!("classes{}lib/*", if cfg!(windows) { ";" } else { ":" }),
        &base,
        true,
    );
    let report = match coordinator.refresh_from(&source, true)? {
        RefreshOutcome::Completed(report) => report,
        RefreshOutcome::Declined => anyhow::bail!("refresh declined"),
    };
    assert_eq!(report.scanned_origins, 2);
    assert_eq!(report.classes_indexed, 3);

    let widgets = index.find_class("Wid");
    assert_eq!(widgets.len(), 1);
    assert_eq!(widgets[0].origin, Origin::ProjectDirectory);
    assert_eq!(index.find_superclass_name("org.example.Widget").as_deref(), Some("org.example.Base"));
    assert!(index.find_class("org.example.Widget$").is_empty());

    let resize = index.find_class_member("org.example.Widget", "resize");
    assert_eq!(resize.len(), 1);
    assert_eq!(resize[0].signature, "public void resize(int width, int height)");
    assert_eq!(
        resize[0].parameter_types,
        Some(vec!["int".to_string(), "int".to_string()])
    );

    let ctor = index.find_class_member("org.example.Widget", "Widget(");
    assert_eq!(ctor.len(), 1);
    assert_eq!(ctor[0].kind, MemberKind::Constructor);

    let revision = index.find_class_member("org.example.Base", "rev");
    assert_eq!(revision[0].kind, MemberKind::Property);
    assert!(index.get_class("org.example.Unlisted").is_some_and(|c| !c.members_loaded));

    // Touching the lower-ranked archive class moves it ahead of the project class.
    assert_eq!(index.find_class("org.example.")[0].class_name, "org.example.Widget");
    assert!(index.touch_class("org.example.Base"));
    assert_eq!(index.find_class("org.example.")[0].class_name, "org.example.Base");

    let size = Descriptor::Member(Arc::clone(&index.find_class_member("org.example.Widget", "size")[0]));
    index.touch(&size);
    assert_eq!(index.find_class_member("org.example.Widget", "")[0].name, "size");

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut perms = std::fs::metadata(path)?.permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

fn run_json(bin: &str, args: &[&str]) -> anyhow::Result<Value> {
    let out = Command::new(bin).args(args).env_remove("CLASSPATH").output()?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

#[cfg(unix)]
#[test]
fn cli_answers_queries_from_fake_javap() -> anyhow::Result<()> {
    let base = temp_dir("cli_flow");
    let jar = base.join("demo.jar");
    write_jar(
        &jar,
        &[
            ("org/example/Widget.class", b""),
            ("org/example/Widget$1.class", b""),
        ],
    )?;

    let fake_javap = base.join("bin").join("javap");
    write_file(
        &fake_javap,
        r#"#!/bin/sh
shift 2
for cls in "$@"; do
  case "$cls" in
    org.example.Widget)
      cat <<'EOF'
Compiled from "Widget.java"
public class org.example.Widget extends org.example.Base {
  public org.example.Widget(java.lang.String);
  public int size();
  public void resize(int, int);
}
EOF
      ;;
  esac
done
"#,
    )?;
    make_executable(&fake_javap)?;

    let bin = env!("CARGO_BIN_EXE_class-index");
    let jar_arg = jar.to_string_lossy().to_string();
    let javap_arg = fake_javap.to_string_lossy().to_string();
    let common = ["--classpath", jar_arg.as_str(), "--javap", javap_arg.as_str(), "--no-system"];

    let mut args = common.to_vec();
    args.extend(["members", "org.example.Widget", "re"]);
    let members = run_json(bin, &args)?;
    assert_eq!(members[0]["name"], Value::String("resize".to_string()));
    assert_eq!(members[0]["kind"], Value::String("method".to_string()));
    assert_eq!(members[0]["parameter_types"], serde_json::json!(["int", "int"]));

    let mut args = common.to_vec();
    args.extend(["superclass", "org.example.Widget"]);
    assert_eq!(run_json(bin, &args)?, Value::String("org.example.Base".to_string()));

    let mut args = common.to_vec();
    args.extend(["classes", "Wid"]);
    let classes = run_json(bin, &args)?;
    assert_eq!(classes.as_array().map(Vec::len), Some(1));
    assert_eq!(classes[0]["origin"], Value::String("project_archive".to_string()));

    let _ = std::fs::remove_dir_all(base);
    Ok(())
}
