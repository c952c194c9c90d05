// Launch Service - conversion and training use cases

use crate::application::constants::TEMPLATE_JOB_PREFIX;
use crate::application::inputs::expand_inputs;
use crate::application::shutdown::ShutdownToken;
use crate::domain::job_script::{apply_settings, render_job_script, splice_command};
use crate::domain::template::{compose_command, quote, quote_all};
use crate::domain::{
    ArgTemplate, ConversionRequest, DomainError, LaunchPlan, Placeholders, Settings,
    TrainingRequest,
};
use crate::error::{AppError, Result};
use crate::port::{
    CommandRunner, CommandSpec, JobScriptStore, JobSubmitter, OutputSink, RunOutcome, Submission,
    TimeProvider,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// How a launch ended
#[derive(Debug, Clone)]
pub enum LaunchOutcome {
    /// Ran locally to completion
    Completed { command: String, run: RunOutcome },
    /// Handed to the scheduler (accepted or not, see `submission`)
    Submitted {
        command: String,
        script: PathBuf,
        submission: Submission,
    },
}

/// Launch Service
///
/// Builds command lines from the configured templates and runs them, one at
/// a time, or wraps them in a SLURM job script.
pub struct LaunchService {
    settings: Settings,
    runner: Arc<dyn CommandRunner>,
    submitter: Arc<dyn JobSubmitter>,
    scripts: Arc<dyn JobScriptStore>,
    time_provider: Arc<dyn TimeProvider>,
    running: Mutex<()>,
}

impl LaunchService {
    pub fn new(
        settings: Settings,
        runner: Arc<dyn CommandRunner>,
        submitter: Arc<dyn JobSubmitter>,
        scripts: Arc<dyn JobScriptStore>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            settings,
            runner,
            submitter,
            scripts,
            time_provider,
            running: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn output_dir(&self, req: &ConversionRequest) -> PathBuf {
        req.output_dir
            .clone()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| self.settings.workspace_dir.clone())
    }

    /// Resolve a conversion request into a command line
    pub fn plan_conversion(&self, req: &ConversionRequest) -> Result<LaunchPlan> {
        req.validate()?;

        let inputs = expand_inputs(&req.inputs)?;
        if inputs.is_empty() {
            return Err(DomainError::NoInputs.into());
        }

        let output_dir = self.output_dir(req);
        let template = pick_template(
            req.args_template.as_deref(),
            &self.settings.conversion.default_args,
        );
        let values = Placeholders::new()
            .set("inputs", quote_all(&inputs))
            .set("output_dir", quote(output_dir.to_string_lossy()))
            .known(
                "labels",
                req.labels.as_ref().map(|p| quote(p.to_string_lossy())),
            );

        let args = template.fill(&values)?;
        Ok(LaunchPlan::Local {
            command: compose_command(req.script.trim(), &args),
            working_dir: self.settings.workspace_dir.clone(),
        })
    }

    /// Resolve a training request into a local run or a SLURM submission
    pub fn plan_training(&self, req: &TrainingRequest) -> Result<LaunchPlan> {
        req.validate()?;

        let template = pick_template(
            req.args_template.as_deref(),
            &self.settings.training.default_args,
        );
        let values = Placeholders::new()
            .set("dataset_dir", quote(req.dataset_dir.trim()))
            .set("model", req.model.as_str());

        let command = compose_command(req.script.trim(), &template.fill(&values)?);
        let use_slurm = req
            .use_slurm
            .unwrap_or(self.settings.slurm.use_slurm_by_default);

        Ok(if use_slurm {
            LaunchPlan::Slurm {
                command,
                template: req.sbatch_template.clone(),
            }
        } else {
            LaunchPlan::Local {
                command,
                working_dir: self.settings.workspace_dir.clone(),
            }
        })
    }

    /// Build and store the job script for `command`
    ///
    /// With a template, its command line is replaced and configured
    /// directives are applied; otherwise a fresh header is rendered.
    pub fn prepare_job_script(&self, command: &str, template: Option<&Path>) -> Result<PathBuf> {
        let stamp = self.time_provider.stamp();
        let slurm = &self.settings.slurm;

        let (prefix, content) = match template {
            Some(path) => {
                let text = self.scripts.read_template(path)?;
                let spliced = splice_command(&text, command);
                (TEMPLATE_JOB_PREFIX, apply_settings(&spliced, slurm)?)
            }
            None => {
                (slurm.effective_job_name(), render_job_script(command, slurm))
            }
        };

        let path = self.scripts.write_script(prefix, &stamp, &content)?;
        info!(script = %path.display(), "Job script written");
        Ok(path)
    }

    /// Submit an existing job script
    pub async fn submit_script(&self, script: &Path) -> Result<Submission> {
        let submission = self.submitter.submit(script).await?;
        if submission.accepted() {
            info!(
                script = %script.display(),
                job_id = ?submission.job_id,
                "Job submitted"
            );
        } else {
            warn!(
                script = %script.display(),
                exit_code = submission.exit_code,
                stderr = %submission.stderr.trim(),
                "Job submission rejected"
            );
        }
        Ok(submission)
    }

    /// Run one command locally; fails with `Busy` while another is running
    pub async fn run_local(
        &self,
        command: &str,
        working_dir: &Path,
        sink: OutputSink,
        shutdown: ShutdownToken,
    ) -> Result<RunOutcome> {
        let _guard = self
            .running
            .try_lock()
            .map_err(|_| AppError::Busy(command.to_string()))?;

        tokio::fs::create_dir_all(working_dir).await?;

        info!(command = %command, working_dir = %working_dir.display(), "Launching");
        let spec = CommandSpec::new(command).in_dir(working_dir);
        let run = self.runner.run(&spec, sink, shutdown).await?;
        info!(
            exit_code = ?run.exit_code,
            status = ?run.status,
            duration_ms = run.duration_ms,
            "Process finished"
        );
        Ok(run)
    }

    /// Convert matrix files with the conversion script (always local)
    pub async fn convert(
        &self,
        req: &ConversionRequest,
        sink: OutputSink,
        shutdown: ShutdownToken,
    ) -> Result<LaunchOutcome> {
        let plan = self.plan_conversion(req)?;
        tokio::fs::create_dir_all(self.output_dir(req)).await?;
        self.execute(plan, sink, shutdown).await
    }

    /// Train a model, locally or through SLURM
    pub async fn train(
        &self,
        req: &TrainingRequest,
        sink: OutputSink,
        shutdown: ShutdownToken,
    ) -> Result<LaunchOutcome> {
        let plan = self.plan_training(req)?;
        self.execute(plan, sink, shutdown).await
    }

    async fn execute(
        &self,
        plan: LaunchPlan,
        sink: OutputSink,
        shutdown: ShutdownToken,
    ) -> Result<LaunchOutcome> {
        match plan {
            LaunchPlan::Local {
                command,
                working_dir,
            } => {
                let run = self
                    .run_local(&command, &working_dir, sink, shutdown)
                    .await?;
                Ok(LaunchOutcome::Completed { command, run })
            }
            LaunchPlan::Slurm { command, template } => {
                let script = self.prepare_job_script(&command, template.as_deref())?;
                let submission = self.submit_script(&script).await?;
                Ok(LaunchOutcome::Submitted {
                    command,
                    script,
                    submission,
                })
            }
        }
    }
}

fn pick_template(explicit: Option<&str>, default: &str) -> ArgTemplate {
    match explicit.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => ArgTemplate::new(text),
        None => ArgTemplate::new(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::shutdown::ShutdownToken;
    use crate::domain::GnnModel;
    use crate::port::command_runner::mocks::MockCommandRunner;
    use crate::port::job_submitter::mocks::MockJobSubmitter;
    use crate::port::{output_channel, OutputLine};
    use crate::port::script_store::mocks::MemoryScriptStore;
    use crate::port::time_provider::FixedTimeProvider;
    use std::time::Duration;

    fn settings() -> Settings {
        let mut settings = Settings::with_workspace(std::env::temp_dir().join("gnnlaunch-core-test"));
        settings.slurm.partition = "gpu".to_string();
        settings
    }

    fn service_with(
        settings: Settings,
        runner: Arc<MockCommandRunner>,
        submitter: Arc<MockJobSubmitter>,
        scripts: Arc<MemoryScriptStore>,
    ) -> LaunchService {
        LaunchService::new(
            settings,
            runner,
            submitter,
            scripts,
            Arc::new(FixedTimeProvider::new(0, "20250101-120000")),
        )
    }

    fn service() -> LaunchService {
        service_with(
            settings(),
            Arc::new(MockCommandRunner::new_success()),
            Arc::new(MockJobSubmitter::new_accepting("99")),
            Arc::new(MemoryScriptStore::new()),
        )
    }

    #[test]
    fn test_plan_conversion_fills_default_template() {
        let svc = service();
        let req = ConversionRequest {
            script: "convert.py".to_string(),
            inputs: vec![PathBuf::from("/d/a 1.mat"), PathBuf::from("/d/b.mat")],
            labels: Some(PathBuf::from("/d/labels.mat")),
            output_dir: Some(PathBuf::from("/out")),
            args_template: None,
        };

        let plan = svc.plan_conversion(&req).unwrap();

        assert_eq!(
            plan.command(),
            "python convert.py --inputs \"/d/a 1.mat\" \"/d/b.mat\" --labels \"/d/labels.mat\" --output_dir \"/out\""
        );
    }

    #[test]
    fn test_plan_conversion_requires_labels_when_template_uses_them() {
        let svc = service();
        let req = ConversionRequest {
            script: "convert.py".to_string(),
            inputs: vec![PathBuf::from("/d/a.mat")],
            ..ConversionRequest::default()
        };

        let err = svc.plan_conversion(&req).unwrap_err();

        assert!(matches!(
            err,
            AppError::Domain(DomainError::UnresolvedPlaceholder(ref k)) if k == "labels"
        ));
    }

    #[test]
    fn test_plan_conversion_defaults_output_to_workspace() {
        let svc = service();
        let req = ConversionRequest {
            script: "./convert".to_string(),
            inputs: vec![PathBuf::from("/d/a.mat")],
            args_template: Some("{inputs} -o {output_dir}".to_string()),
            ..ConversionRequest::default()
        };

        let plan = svc.plan_conversion(&req).unwrap();
        let expected_out = quote(svc.settings().workspace_dir.to_string_lossy());

        assert_eq!(
            plan.command(),
            format!("./convert \"/d/a.mat\" -o {}", expected_out)
        );
    }

    #[test]
    fn test_plan_training_local_and_override() {
        let svc = service();
        let mut req = TrainingRequest::new("train.py", "/data/pt", GnnModel::GatV2);

        let plan = svc.plan_training(&req).unwrap();
        assert!(matches!(plan, LaunchPlan::Local { .. }));
        assert_eq!(
            plan.command(),
            "python train.py --data \"/data/pt\" --model GATv2"
        );

        req.args_template = Some("--model {model} --epochs 5".to_string());
        req.use_slurm = Some(true);
        let plan = svc.plan_training(&req).unwrap();
        assert!(matches!(plan, LaunchPlan::Slurm { .. }));
        assert_eq!(plan.command(), "python train.py --model GATv2 --epochs 5");
    }

    #[test]
    fn test_plan_training_honours_slurm_default() {
        let mut s = settings();
        s.slurm.use_slurm_by_default = true;
        let svc = service_with(
            s,
            Arc::new(MockCommandRunner::new_success()),
            Arc::new(MockJobSubmitter::new_accepting("1")),
            Arc::new(MemoryScriptStore::new()),
        );

        let req = TrainingRequest::new("train.py", "/data", GnnModel::Gcn);
        assert!(matches!(
            svc.plan_training(&req).unwrap(),
            LaunchPlan::Slurm { .. }
        ));
    }

    #[tokio::test]
    async fn test_train_local_streams_output() {
        let runner = Arc::new(MockCommandRunner::new(
            vec![OutputLine::stdout("epoch 1"), OutputLine::stderr("warn")],
            0,
        ));
        let svc = service_with(
            settings(),
            runner.clone(),
            Arc::new(MockJobSubmitter::new_accepting("1")),
            Arc::new(MemoryScriptStore::new()),
        );
        let (tx, mut rx) = output_channel();

        let req = TrainingRequest::new("train.py", "/data", GnnModel::Gcn);
        let outcome = svc.train(&req, tx, ShutdownToken::never()).await.unwrap();

        match outcome {
            LaunchOutcome::Completed { run, .. } => assert_eq!(run.exit_code, Some(0)),
            other => panic!("expected local run, got {:?}", other),
        }
        assert_eq!(rx.recv().await.unwrap().text, "epoch 1");
        assert_eq!(rx.recv().await.unwrap().text, "warn");

        let specs = runner.commands();
        assert_eq!(specs.len(), 1);
        assert_eq!(
            specs[0].working_dir.as_deref(),
            Some(svc.settings().workspace_dir.as_path())
        );
    }

    #[tokio::test]
    async fn test_train_slurm_writes_and_submits_script() {
        let submitter = Arc::new(MockJobSubmitter::new_accepting("4242"));
        let scripts = Arc::new(MemoryScriptStore::new());
        let svc = service_with(
            settings(),
            Arc::new(MockCommandRunner::new_success()),
            submitter.clone(),
            scripts.clone(),
        );

        let mut req = TrainingRequest::new("train.py", "/data", GnnModel::Gat);
        req.use_slurm = Some(true);
        let (tx, _rx) = output_channel();
        let outcome = svc.train(&req, tx, ShutdownToken::never()).await.unwrap();

        let LaunchOutcome::Submitted {
            script, submission, ..
        } = outcome
        else {
            panic!("expected submission");
        };
        assert_eq!(script, PathBuf::from("/jobs/gnn_job_20250101-120000.sh"));
        assert_eq!(submission.job_id.as_deref(), Some("4242"));
        assert_eq!(submitter.submitted(), vec![script.clone()]);

        let content = scripts.get(&script).unwrap();
        assert!(content.starts_with("#!/bin/bash -l\n"));
        assert!(content.contains("#SBATCH -p gpu\n"));
        assert!(content.ends_with("python train.py --data \"/data\" --model GAT\n"));
    }

    #[tokio::test]
    async fn test_train_slurm_from_template() {
        let scripts = Arc::new(
            MemoryScriptStore::new().with_template(
                "/tpl/job.sh",
                "#!/bin/bash\n#SBATCH -p cpu\nsource env.sh\npython old.py\n",
            ),
        );
        let svc = service_with(
            settings(),
            Arc::new(MockCommandRunner::new_success()),
            Arc::new(MockJobSubmitter::new_accepting("5")),
            scripts.clone(),
        );

        let mut req = TrainingRequest::new("train.py", "/data", GnnModel::Gcn);
        req.use_slurm = Some(true);
        req.sbatch_template = Some(PathBuf::from("/tpl/job.sh"));
        let (tx, _rx) = output_channel();
        let outcome = svc.train(&req, tx, ShutdownToken::never()).await.unwrap();

        let LaunchOutcome::Submitted { script, .. } = outcome else {
            panic!("expected submission");
        };
        let content = scripts.get(&script).unwrap();
        assert!(content.contains("#SBATCH -p gpu\n"));
        assert!(content.contains("source env.sh\npython train.py --data \"/data\" --model GCN\n"));
        assert!(!content.contains("old.py"));
    }

    #[tokio::test]
    async fn test_second_local_run_is_busy() {
        let runner = Arc::new(MockCommandRunner::new_success().with_delay(Duration::from_millis(200)));
        let svc = Arc::new(service_with(
            settings(),
            runner,
            Arc::new(MockJobSubmitter::new_accepting("1")),
            Arc::new(MemoryScriptStore::new()),
        ));
        let dir = svc.settings().workspace_dir.clone();

        let first = {
            let svc = svc.clone();
            let dir = dir.clone();
            tokio::spawn(async move {
                let (tx, _rx) = output_channel();
                svc.run_local("sleep", &dir, tx, ShutdownToken::never()).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (tx, _rx) = output_channel();
        let second = svc.run_local("echo", &dir, tx, ShutdownToken::never()).await;

        assert!(matches!(second, Err(AppError::Busy(_))));
        assert!(first.await.unwrap().is_ok());
    }
}
