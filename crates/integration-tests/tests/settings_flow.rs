//! Settings file edits flowing into launch planning.

use gnnlaunch_core::application::LaunchService;
use gnnlaunch_core::domain::{GnnModel, LaunchPlan, Settings, TrainingRequest};
use gnnlaunch_core::port::command_runner::mocks::MockCommandRunner;
use gnnlaunch_core::port::job_submitter::mocks::MockJobSubmitter;
use gnnlaunch_core::port::script_store::mocks::MemoryScriptStore;
use gnnlaunch_core::port::time_provider::FixedTimeProvider;
use gnnlaunch_core::port::SettingsRepository;
use gnnlaunch_infra_config::{set_value, FileSettingsRepository};
use std::sync::Arc;
use tempfile::TempDir;

fn repo(temp: &TempDir) -> FileSettingsRepository {
    FileSettingsRepository::new(
        temp.path().join("gnnlaunch.toml"),
        Settings::with_workspace(temp.path().join("ws")),
    )
    .with_env_prefix(None)
}

fn service(settings: Settings) -> LaunchService {
    LaunchService::new(
        settings,
        Arc::new(MockCommandRunner::new_success()),
        Arc::new(MockJobSubmitter::new_accepting("1")),
        Arc::new(MemoryScriptStore::new()),
        Arc::new(FixedTimeProvider::new(0, "20240101-000000")),
    )
}

#[test]
fn test_edited_settings_drive_training_plan() {
    let temp = TempDir::new().unwrap();
    let repo = repo(&temp);

    let mut settings = repo.load().unwrap();
    for (key, value) in [
        ("training.script_path", "/opt/gnn/train.py"),
        ("training.default_args", "--root {dataset_dir} --arch {model} --epochs 50"),
        ("slurm.use_slurm_by_default", "true"),
    ] {
        settings = set_value(&settings, key, value).unwrap();
    }
    repo.save(&settings).unwrap();

    let reloaded = repo.load().unwrap();
    assert_eq!(reloaded, settings);

    let service = service(reloaded.clone());
    let req = TrainingRequest::new(&reloaded.training.script_path, "/data/set", GnnModel::GraphSage);
    let plan = service.plan_training(&req).unwrap();

    assert_eq!(
        plan,
        LaunchPlan::Slurm {
            command: r#"python /opt/gnn/train.py --root "/data/set" --arch GraphSAGE --epochs 50"#
                .to_string(),
            template: None,
        }
    );
}

#[test]
fn test_saved_file_is_readable_toml() {
    let temp = TempDir::new().unwrap();
    let repo = repo(&temp);

    let settings = set_value(&repo.load().unwrap(), "slurm.mem", "64G").unwrap();
    repo.save(&settings).unwrap();

    let text = std::fs::read_to_string(repo.location()).unwrap();
    assert!(text.contains("[slurm]"));
    assert!(text.contains("mem = \"64G\""));
}
