use modforge_composer::{
    CancellationToken, ComposeWarning, ComposerError, Decomposer, ModforgeConfig, Project,
    ProjectLock, RecomposeOptions, Recomposer,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SOURCE: &str = "import os

RETRIES = 3


class Engine:
    def start(self):
        return os.getpid()


def run():
    return Engine().start()
";

fn decomposed() -> (TempDir, Project) {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("app.py"), SOURCE).expect("write source");
    let project = Project::new(dir.path(), "app.py");
    Decomposer::new(ModforgeConfig::default())
        .run(&project)
        .expect("decompose");
    (dir, project)
}

fn recompose(project: &Project) -> (String, Vec<ComposeWarning>) {
    let report = Recomposer::new(ModforgeConfig::default())
        .run(project, &RecomposeOptions::default())
        .expect("recompose");
    let body = std::fs::read_to_string(&report.output).expect("output");
    (body, report.warnings)
}

fn python_files(project: &Project) -> Vec<String> {
    match std::fs::read_dir(project.modules_dir()) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".py"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[test]
fn parse_error_leaves_no_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("app.py"), "def broken(:\n    pass\n").expect("write");
    let project = Project::new(dir.path(), "app.py");

    let err = Decomposer::new(ModforgeConfig::default())
        .run(&project)
        .expect_err("should fail");
    assert!(matches!(err, ComposerError::Parse(_)));
    assert!(!project.modules_dir().exists());
}

#[test]
fn missing_source_is_an_io_error() {
    let dir = TempDir::new().expect("tempdir");
    let project = Project::new(dir.path(), "absent.py");
    let err = Decomposer::new(ModforgeConfig::default())
        .run(&project)
        .expect_err("should fail");
    assert!(matches!(err, ComposerError::Io { .. }));
}

#[test]
fn edited_module_text_is_reported_and_kept() {
    let (_dir, project) = decomposed();
    let config_py = project.modules_dir().join("config.py");
    let text = std::fs::read_to_string(&config_py).expect("config.py");
    std::fs::write(&config_py, text.replace("RETRIES = 3", "RETRIES = 5")).expect("edit");

    let (body, warnings) = recompose(&project);
    assert_eq!(body, SOURCE.replace("RETRIES = 3", "RETRIES = 5"));
    assert!(warnings.iter().any(|w| matches!(
        w,
        ComposeWarning::ChecksumMismatch { id, .. } if id == "0001-constant-RETRIES"
    )));
}

#[test]
fn source_drift_is_reported() {
    let (dir, project) = decomposed();
    std::fs::write(dir.path().join("app.py"), format!("{SOURCE}\nrun()\n")).expect("edit");

    let (body, warnings) = recompose(&project);
    assert_eq!(body, SOURCE);
    assert!(warnings
        .iter()
        .any(|w| matches!(w, ComposeWarning::SourceDrift { .. })));
}

#[test]
fn deleted_module_degrades_to_best_effort() {
    let (_dir, project) = decomposed();
    std::fs::remove_file(project.modules_dir().join("config.py")).expect("remove");

    let (body, warnings) = recompose(&project);
    assert_eq!(body, SOURCE.replace("import os\n\nRETRIES = 3\n", ""));
    let missing = warnings
        .iter()
        .filter(|w| matches!(w, ComposeWarning::Reconstruction { .. }))
        .count();
    assert_eq!(missing, 2);
}

#[test]
fn hand_added_module_is_appended_after_known_code() {
    let (_dir, project) = decomposed();
    std::fs::write(
        project.modules_dir().join("extras.py"),
        "def extra():\n    return 1\n",
    )
    .expect("write extras");

    let (body, warnings) = recompose(&project);
    assert_eq!(body, format!("{SOURCE}def extra():\n    return 1\n"));
    assert!(warnings
        .iter()
        .any(|w| matches!(w, ComposeWarning::Reconstruction { .. })));
}

#[test]
fn missing_metadata_falls_back_to_heuristic_order() {
    let (_dir, project) = decomposed();
    std::fs::remove_file(project.metadata_path()).expect("remove metadata");

    let (body, warnings) = recompose(&project);
    assert_eq!(body, SOURCE);
    assert!(matches!(
        warnings.as_slice(),
        [ComposeWarning::MetadataMissing { .. }]
    ));
}

#[test]
fn corrupt_metadata_is_fatal() {
    let (_dir, project) = decomposed();
    std::fs::write(project.metadata_path(), "[]").expect("corrupt");

    let err = Recomposer::new(ModforgeConfig::default())
        .run(&project, &RecomposeOptions::default())
        .expect_err("should fail");
    assert!(matches!(err, ComposerError::Metadata { .. }));
}

#[test]
fn missing_modules_dir_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let project = Project::from_modules_dir(dir.path().join("modules"));
    let err = Recomposer::new(ModforgeConfig::default())
        .run(&project, &RecomposeOptions::default())
        .expect_err("should fail");
    assert!(matches!(err, ComposerError::ModulesDirMissing(_)));
}

#[test]
fn held_lock_refuses_both_pipelines() {
    let (_dir, project) = decomposed();
    let _held = ProjectLock::acquire(&project).expect("lock");

    let err = Decomposer::new(ModforgeConfig::default())
        .run(&project)
        .expect_err("decompose should refuse");
    assert!(matches!(err, ComposerError::ConcurrentOperation { .. }));

    let err = Recomposer::new(ModforgeConfig::default())
        .run(&project, &RecomposeOptions::default())
        .expect_err("recompose should refuse");
    assert!(matches!(err, ComposerError::ConcurrentOperation { .. }));
}

#[test]
fn cancelled_decomposition_writes_nothing() {
    let dir = TempDir::new().expect("tempdir");
    std::fs::write(dir.path().join("app.py"), SOURCE).expect("write source");
    let project = Project::new(dir.path(), "app.py");

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Decomposer::new(ModforgeConfig::default())
        .with_cancellation(cancel)
        .run(&project)
        .expect_err("should be cancelled");

    assert!(err.is_cancelled());
    assert!(python_files(&project).is_empty());
    assert!(!project.metadata_path().exists());
    assert!(!project.staging_dir().exists());
}

#[test]
fn cancelled_redecomposition_keeps_previous_modules() {
    let (dir, project) = decomposed();
    let before = std::fs::read_to_string(project.modules_dir().join("core.py")).expect("core");
    let metadata_before = std::fs::read(project.metadata_path()).expect("metadata");

    std::fs::write(dir.path().join("app.py"), "def replaced():\n    pass\n").expect("edit");
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Decomposer::new(ModforgeConfig::default())
        .with_cancellation(cancel)
        .run(&project)
        .expect_err("should be cancelled");

    assert!(matches!(err, ComposerError::Cancelled { .. }));
    assert_eq!(
        std::fs::read_to_string(project.modules_dir().join("core.py")).expect("core"),
        before
    );
    assert_eq!(std::fs::read(project.metadata_path()).expect("metadata"), metadata_before);
}

#[test]
fn cancelled_recomposition_writes_no_output() {
    let (_dir, project) = decomposed();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = Recomposer::new(ModforgeConfig::default())
        .with_cancellation(cancel)
        .run(&project, &RecomposeOptions::default())
        .expect_err("should be cancelled");
    assert!(err.is_cancelled());
    assert!(!project.default_output().exists());
}

#[test]
fn rules_change_removes_stale_modules() {
    let (dir, project) = decomposed();
    std::fs::write(
        dir.path().join("modforge.toml"),
        "categories = [\"everything\"]\n\n[[category_rules]]\ncategory = \"everything\"\nmatch_kind = \"kind\"\npattern = \"import\"\n",
    )
    .expect("config");
    let config = ModforgeConfig::discover(dir.path(), None).expect("config");
    Decomposer::new(config).run(&project).expect("decompose");

    let mut files = python_files(&project);
    files.sort();
    assert_eq!(files, vec!["__init__.py", "core.py", "everything.py"]);
    assert!(!project.modules_dir().join("config.py").exists());

    let (body, _) = recompose(&project);
    assert_eq!(body, SOURCE);
}

#[test]
fn lock_is_released_after_each_run() {
    let (_dir, project) = decomposed();
    recompose(&project);
    drop(ProjectLock::acquire(&project).expect("free after recompose"));

    Recomposer::new(ModforgeConfig::default())
        .compose(&project, true)
        .expect("compose");
    drop(ProjectLock::acquire(&project).expect("free after compose"));

    Decomposer::new(ModforgeConfig::default())
        .run(&project)
        .expect("decompose");
    drop(ProjectLock::acquire(&project).expect("free after decompose"));
}

#[test]
fn recompose_does_not_create_a_missing_modules_dir() {
    let dir = TempDir::new().expect("tempdir");
    let project = Project::from_modules_dir(dir.path().join("modules"));
    let err = Recomposer::new(ModforgeConfig::default())
        .compose(&project, false)
        .expect_err("should fail");
    assert!(matches!(err, ComposerError::ModulesDirMissing(_)));
    assert!(!project.modules_dir().exists());
}
