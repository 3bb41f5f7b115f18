//! # Movie Metadata Ingestion Job
//!
//! ## Visão Geral
//! Monta os containers da conta, lê o CSV de metadados de filmes, achata o JSON
//! embutido nas colunas e grava o registro achatado em Parquet.
//!
//! ## Princípios de Engenharia
//! - **Fail-Fast**: segredo ausente, montagem recusada ou schema divergente abortam o job.
//! - **Observabilidade**: logs por etapa (`RUST_LOG`) e tempos de execução no relatório final.
//! - **Idempotência**: a saída é sempre sobrescrita; reexecutar o job produz o mesmo resultado.

use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use movie_ingest::models::Config;
use movie_ingest::pipeline::{Pipeline, RunOptions};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Arquivo TOML de configuração do pipeline
    #[arg(default_value = "pipeline.toml")]
    config: PathBuf,

    /// Executa todas as etapas, exceto a escrita do Parquet
    #[arg(long)]
    dry_run: bool,

    /// Não calcula a auditoria de nulos
    #[arg(long)]
    skip_audit: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    let global_timer = Instant::now();

    println!("--- INICIANDO INGESTÃO DE METADADOS ---");

    let config = match Config::load_from_file(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Erro na carga de configuração: {}", e);
            std::process::exit(1);
        }
    };

    let options = RunOptions {
        dry_run: cli.dry_run,
        skip_audit: cli.skip_audit,
    };

    let mut pipeline = Pipeline::new(config);
    let summary = match pipeline.run(options) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Falha no pipeline: {}", e);
            std::process::exit(1);
        }
    };

    for (mount_point, source) in pipeline.mounts().mounts() {
        println!("Montado: {} -> {}", mount_point, source);
    }

    if let Some(audit) = &summary.audit {
        println!("\n{}", audit);
    }

    println!(
        "\nLinhas: {} lidas, {} após limpeza, {} após achatamento",
        summary.load.rows_read,
        summary.load.rows_kept,
        summary.frame.height()
    );
    if !summary.flatten.collection_columns.is_empty() {
        println!(
            "Colunas de coleção: {}",
            summary.flatten.collection_columns.join(", ")
        );
    }
    if !summary.coerced_columns.is_empty() {
        println!(
            "Colunas convertidas para texto: {}",
            summary.coerced_columns.join(", ")
        );
    }
    match summary.written {
        Some((rows, cols)) => println!(
            "Sucesso: Parquet gerado em {} ({} linhas x {} colunas)",
            pipeline.config().output.path,
            rows,
            cols
        ),
        None => println!("Dry-run: nada foi gravado"),
    }

    println!("\n==========================================");
    for (step, elapsed) in &summary.timings {
        println!("{:<8} {:.2?}", step, elapsed);
    }
    println!("Tempo de execução: {:.2?}", global_timer.elapsed());
    println!("==========================================");

    Ok(())
}
