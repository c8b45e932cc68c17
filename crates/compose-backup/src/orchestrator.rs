//! Runs the backup of every discovered service
//!

use core::time::Duration;

use tracing::info;

use crate::{
    config::Config,
    context::Context,
    credentials::Credentials,
    discovery::{ServiceDirectory, discover_services},
    executor::{ScriptExecutor, ScriptPhase},
    matcher::{ContainerTarget, match_targets},
    policy::resolve_policies,
    run::{BackupRun, RunReport, TransferError},
    runtime::ContainerRuntime,
    transfer::{target_directory, transfer_location},
};

/// Drives a backup run: services, then their containers, then each container's
/// pre-scripts, data locations and post-scripts, strictly in that order.
///
/// Failures below the run level are recorded in the run and never stop it.
pub struct Orchestrator<'a, R: ContainerRuntime + ?Sized> {
    runtime: &'a R,
    config: &'a Config,
    scripts: ScriptExecutor,
}

impl<'a, R: ContainerRuntime + ?Sized> Orchestrator<'a, R> {
    /// Create an orchestrator using `runtime` and the admin `credentials`.
    pub fn new(runtime: &'a R, config: &'a Config, credentials: Credentials) -> Self {
        let scripts = ScriptExecutor::new(
            credentials,
            &config.credentials,
            Duration::from_secs(config.docker.exec_timeout_secs),
        );

        Self {
            runtime,
            config,
            scripts,
        }
    }

    /// Back up every service and return the finished run.
    pub async fn run(&self) -> RunReport {
        let mut run = BackupRun::start(&self.config.backup_directory);
        let mut context = Context {
            current_context: "Discover",
            ..Default::default()
        };

        info!("*** Starting backup ***");

        let services = match discover_services(
            &self.config.services_directory,
            &self.config.definition_file_names,
        ) {
            Ok(services) => services,
            Err(error) => {
                run.record(&context, TransferError::Discovery(error));
                return run.finish();
            }
        };

        if services.is_empty() {
            info!(
                "{context}No service directories containing {} found",
                self.config.definition_file_names.join(" or ")
            );
            return run.finish();
        }

        context.current_context = "";
        for service in &services {
            self.backup_service(&mut run, service).await;
        }

        run.finish()
    }

    async fn backup_service(&self, run: &mut BackupRun, service: &ServiceDirectory) {
        let name = service.name();
        let mut context = Context::for_service(&name);
        info!("{context}*** Processing {:?} ***", service.path());

        // Resolve policies
        context.current_context = "Resolve Policy";
        let policies = match resolve_policies(service, &self.config.labels) {
            Ok(policies) => policies,
            Err(source) => {
                run.record(
                    &context,
                    TransferError::Service {
                        service: name,
                        source,
                    },
                );
                return;
            }
        };
        info!(
            "{context}Container types to backup: {}",
            policies.keys().cloned().collect::<Vec<_>>().join(", ")
        );

        if policies.is_empty() {
            return;
        }

        // Match running containers
        context.current_context = "Match Containers";
        let container_names = match self.runtime.list_containers().await {
            Ok(names) => names,
            Err(source) => {
                run.record(
                    &context,
                    TransferError::ListContainers {
                        service: name,
                        source,
                    },
                );
                return;
            }
        };

        let targets = match_targets(&service.container_prefix(), &policies, &container_names);
        info!(
            "{context}Containers to backup: {}",
            targets
                .iter()
                .map(|target| target.container_name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        run.service_processed();

        for target in &targets {
            self.backup_target(run, &context, target).await;
        }
    }

    async fn backup_target(
        &self,
        run: &mut BackupRun,
        context: &Context,
        target: &ContainerTarget<'_>,
    ) {
        let mut context = context.with_container(&target.container_name);
        context.current_context = "";
        info!("{context}*** Starting backup of {} ***", target.container_name);
        run.target_processed();

        self.run_scripts(run, &mut context, target, ScriptPhase::Pre).await;
        self.transfer_data(run, &mut context, target).await;
        self.run_scripts(run, &mut context, target, ScriptPhase::Post).await;
    }

    async fn run_scripts(
        &self,
        run: &mut BackupRun,
        context: &mut Context,
        target: &ContainerTarget<'_>,
        phase: ScriptPhase,
    ) {
        context.current_context = phase.context();

        let scripts = match phase {
            ScriptPhase::Pre => &target.policy.pre_scripts,
            ScriptPhase::Post => &target.policy.post_scripts,
        };

        if scripts.is_empty() {
            info!("{context}No {phase}s defined");
            return;
        }

        for command in scripts {
            info!("{context}Execute '{command}'");

            let output = match self
                .scripts
                .execute(self.runtime, &target.container_name, command)
                .await
            {
                Ok(output) => output,
                Err(source) => {
                    run.record(
                        context,
                        TransferError::Script {
                            container: target.container_name.clone(),
                            phase,
                            command: command.clone(),
                            source,
                        },
                    );
                    continue;
                }
            };

            if !output.output.is_empty() {
                info!("{context}Command output:\n{}", output.output);
            }

            if !output.success() {
                run.record(
                    context,
                    TransferError::ExitCode {
                        container: target.container_name.clone(),
                        phase,
                        command: command.clone(),
                        code: output.exit_code,
                    },
                );
            }
        }
    }

    async fn transfer_data(
        &self,
        run: &mut BackupRun,
        context: &mut Context,
        target: &ContainerTarget<'_>,
    ) {
        context.current_context = "Transfer";

        let directory = target_directory(
            run.backup_root(),
            &target.container_name,
            run.timestamp(),
        );
        let archive_timeout = Duration::from_secs(self.config.docker.archive_timeout_secs);

        for location in &target.policy.data_locations {
            info!("{context}Backing up {location}");

            match transfer_location(
                self.runtime,
                &target.container_name,
                location,
                &directory,
                archive_timeout,
            )
            .await
            {
                Ok(destination) => info!("{context}Saved {location} to {destination:?}"),
                Err(source) => run.record(
                    context,
                    TransferError::Transfer {
                        container: target.container_name.clone(),
                        location: location.clone(),
                        source,
                    },
                ),
            }
        }
    }
}
