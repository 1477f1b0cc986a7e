// src/services/scheduler.rs

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::{models::sync::AggregateReport, services::orchestrator::SyncOrchestrator};

/// Agenda a sincronização completa de todas as filiais ativas.
/// `schedule` é uma expressão cron com segundos (ex.: `0 0 2 * * *`).
pub async fn start_scheduler(orchestrator: SyncOrchestrator, schedule: &str) -> Result<JobScheduler> {
    let sched = JobScheduler::new().await.context("criando o agendador")?;

    let job = Job::new_async(schedule, move |_uuid, _l| {
        let orchestrator = orchestrator.clone();
        Box::pin(async move {
            run_scheduled_sync(&orchestrator).await;
        })
    })
    .with_context(|| format!("criando job de sincronização para o cron '{schedule}'"))?;

    sched.add(job).await.context("registrando job de sincronização")?;
    sched.start().await.context("iniciando o agendador")?;

    info!(schedule, "⏰ Sincronização agendada");
    Ok(sched)
}

/// Mesmo caminho do disparo manual sem códigos explícitos; só registra o resultado.
pub async fn run_scheduled_sync(orchestrator: &SyncOrchestrator) -> Option<AggregateReport> {
    info!("Sincronização agendada iniciada");

    match orchestrator.sync_all_branches(None).await {
        Ok(report) => {
            if report.success {
                info!(message = %report.message, "✅ Sincronização agendada concluída");
            } else {
                warn!(
                    message = %report.message,
                    failed = report.summary.failed_branches,
                    "Sincronização agendada concluída com falhas"
                );
            }
            Some(report)
        }
        Err(e) => {
            error!(error = %e, "❌ Sincronização agendada falhou");
            None
        }
    }
}
