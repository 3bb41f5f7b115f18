//! # Ingestion Pipeline
//!
//! Orquestra as etapas em sequência estrita: segredos → montagens → leitura e limpeza →
//! normalização → auditoria de nulos → achatamento → coerção → projeção → escrita.
//!
//! ## Modelo de Execução
//! - Um único job bloqueante; o paralelismo interno fica a cargo do Polars.
//! - Sem checkpoint: qualquer falha interrompe o job, que deve ser reexecutado a partir
//!   do arquivo de origem.

use polars::prelude::DataFrame;
use std::time::{Duration, Instant};

use crate::api::{self, AdlsBackend};
use crate::audit::{self, NullAudit};
use crate::auth::{self, OAuthConfig};
use crate::errors::PipelineError;
use crate::flatten::{self, FlattenReport};
use crate::loader::{self, LoadReport};
use crate::models::{BackendKind, Config};
use crate::mount::{LocalBackend, MountTable, StorageBackend};
use crate::processor;
use crate::secrets::{self, SecretStore};

/// Opções de execução vindas da linha de comando.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Para antes da escrita.
    pub dry_run: bool,
    pub skip_audit: bool,
}

/// O que aconteceu em cada etapa.
#[derive(Debug)]
pub struct RunSummary {
    pub load: LoadReport,
    pub audit: Option<NullAudit>,
    pub flatten: FlattenReport,
    pub coerced_columns: Vec<String>,
    /// `None` em dry-run.
    pub written: Option<(usize, usize)>,
    pub frame: DataFrame,
    pub timings: Vec<(&'static str, Duration)>,
}

pub struct Pipeline {
    config: Config,
    mounts: MountTable,
    secrets: Option<Box<dyn SecretStore>>,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            mounts: MountTable::new(),
            secrets: None,
        }
    }

    /// Substitui o cofre descrito em `[secrets]`.
    pub fn with_secret_store(mut self, store: Box<dyn SecretStore>) -> Self {
        self.secrets = Some(store);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn mounts(&self) -> &MountTable {
        &self.mounts
    }

    /// Resolve credenciais (se necessário) e monta todos os containers declarados.
    ///
    /// # Errors
    /// Segredo ausente, credencial recusada ou container inacessível: sempre antes de
    /// qualquer leitura de dados.
    pub fn setup_mounts(&mut self) -> Result<(), PipelineError> {
        let backends = match self.config.storage.backend {
            BackendKind::Adls => self.adls_backends()?,
            BackendKind::Local => self.local_backends()?,
        };

        for (container, backend) in backends {
            let source = self.config.source_uri(&container);
            let mount_point = self.config.mount_point(&container);
            self.mounts.mount(&source, &mount_point, backend)?;

            let entries = self.mounts.ls(&mount_point)?;
            log::info!("{}: {} entradas", mount_point, entries.len());
        }
        Ok(())
    }

    fn adls_backends(&self) -> Result<Vec<(String, Box<dyn StorageBackend>)>, PipelineError> {
        let principal = match &self.secrets {
            Some(store) => secrets::resolve_principal(store.as_ref(), &self.config.secrets)?,
            None => {
                let store = secrets::store_from_config(&self.config.secrets)?;
                secrets::resolve_principal(store.as_ref(), &self.config.secrets)?
            }
        };

        let oauth = OAuthConfig::new(
            &principal,
            &self.config.auth.token_endpoint,
            &self.config.auth.resource,
        );
        log::debug!(
            "Configuração OAuth: {:?}",
            oauth.extra_configs().keys().collect::<Vec<_>>()
        );
        let client = api::create_http_client()?;
        let token = auth::acquire_token(&client, &oauth)?;
        let endpoint = self.config.dfs_endpoint();

        Ok(self
            .config
            .storage
            .containers
            .iter()
            .map(|container| {
                let backend: Box<dyn StorageBackend> = Box::new(AdlsBackend::new(
                    client.clone(),
                    &endpoint,
                    container,
                    token.clone(),
                ));
                (container.clone(), backend)
            })
            .collect())
    }

    fn local_backends(&self) -> Result<Vec<(String, Box<dyn StorageBackend>)>, PipelineError> {
        let root = self.config.storage.local_root.as_ref().ok_or_else(|| {
            PipelineError::Config("backend local exige storage.local_root".to_string())
        })?;
        Ok(self
            .config
            .storage
            .containers
            .iter()
            .map(|container| {
                let backend: Box<dyn StorageBackend> =
                    Box::new(LocalBackend::new(root.join(container)));
                (container.clone(), backend)
            })
            .collect())
    }

    /// Executa o job completo.
    pub fn run(&mut self, options: RunOptions) -> Result<RunSummary, PipelineError> {
        let mut timings = Vec::new();
        let mut step = Instant::now();
        let mut lap = |name: &'static str, step: &mut Instant| {
            timings.push((name, step.elapsed()));
            *step = Instant::now();
        };

        if self.mounts.mounts().next().is_none() {
            self.setup_mounts()?;
        }
        lap("mount", &mut step);

        let bytes = self.mounts.read(&self.config.source.path)?;
        let (mut df, load) = loader::load_and_clean(bytes, self.config.source.strict)?;
        lap("load", &mut step);

        flatten::normalize_empty_arrays(&mut df)?;
        let audit = if options.skip_audit {
            None
        } else {
            Some(audit::null_audit(&df, &self.config.source.logical_name)?)
        };
        lap("audit", &mut step);

        let (mut df, flatten) = flatten::flatten(df, &self.config.flatten)?;
        lap("flatten", &mut step);

        let coerced_columns = processor::coerce_null_columns(&mut df)?;
        let mut frame = processor::select_output(&df, &self.config.output.columns)?;

        let written = if options.dry_run {
            log::info!("Dry-run: escrita em {} ignorada", self.config.output.path);
            None
        } else {
            Some(processor::write_output(
                &self.mounts,
                &self.config.output.path,
                &mut frame,
            )?)
        };
        lap("write", &mut step);

        Ok(RunSummary {
            load,
            audit,
            flatten,
            coerced_columns,
            written,
            frame,
            timings,
        })
    }
}
