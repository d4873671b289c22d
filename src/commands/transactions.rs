use crate::api::Mode;
use crate::args::{AddArgs, ListArgs, ReportArgs, UpdateArgs};
use crate::commands::{open_pipeline, Out};
use crate::gateway::TransactionList;
use crate::model::{format_brl, FinancialSummary, Report, ReportQuery, SummarySource};
use crate::normalize::TransactionDraft;
use crate::pipeline::ActionOutcome;
use crate::{Config, Result};
use anyhow::bail;
use serde_json::{Map, Value};
use tracing::warn;

/// Computes the financial summary. Never fails because of the backend; a summary that could not
/// be computed is all zeros and says so.
pub async fn summary(config: &Config, mode: Mode) -> Result<Out<FinancialSummary>> {
    let mut pipeline = open_pipeline(config, mode).await?;
    let summary = pipeline.refresh_summary().await;
    let message = match summary.source {
        SummarySource::Failed => {
            "Unable to reach the backend; showing an empty summary".to_string()
        }
        source => format!(
            "Balance {} (income {}, expenses {}) from {source}",
            format_brl(summary.balance),
            summary.total_income,
            summary.total_expenses
        ),
    };
    Ok(Out::new(message, summary))
}

pub async fn list(config: &Config, mode: Mode, args: &ListArgs) -> Result<Out<TransactionList>> {
    let pipeline = open_pipeline(config, mode).await?;
    let list = pipeline
        .gateway()
        .list_transactions(pipeline.session(), args.kind(), args.limit())
        .await;
    if !list.success {
        bail!(
            "{}",
            list.message
                .as_deref()
                .unwrap_or(crate::pipeline::LIST_FAILED)
        );
    }
    if list.skipped > 0 {
        warn!("{} record(s) could not be read and were left out", list.skipped);
    }
    Ok(Out::new(
        format!("Found {} transaction(s)", list.transacoes.len()),
        list,
    ))
}

/// Records a new transaction and reports the refreshed summary through the outcome.
pub async fn add(config: &Config, mode: Mode, args: &AddArgs) -> Result<Out<ActionOutcome>> {
    let mut pipeline = open_pipeline(config, mode).await?;
    let draft = TransactionDraft {
        valor: Some(Value::String(args.amount.clone())),
        data: args.date.clone(),
        data_recebimento: args.received_at.clone(),
        categoria: args.category.clone().map(Value::String),
        descricao: args.description.clone(),
        recorrente: args.recurring,
        periodo: args.period.map(|p| p.to_string()),
        extra: Map::new(),
    };
    let outcome = pipeline.add_transaction(args.kind, &draft).await;
    finish(outcome)
}

pub async fn update(config: &Config, mode: Mode, args: &UpdateArgs) -> Result<Out<ActionOutcome>> {
    let mut pipeline = open_pipeline(config, mode).await?;
    let fields: Map<String, Value> = args
        .fields
        .iter()
        .map(|f| (f.name.clone(), f.value.clone()))
        .collect();
    let outcome = pipeline.update_transaction(args.kind, &args.id, &fields).await;
    finish(outcome)
}

pub async fn report(config: &Config, mode: Mode, args: &ReportArgs) -> Result<Out<Report>> {
    let mut pipeline = open_pipeline(config, mode).await?;
    let query = ReportQuery {
        periodo: args.period,
        data_inicio: args.from.clone(),
        data_fim: args.to.clone(),
        tipo: args.kind,
        limite: args.limit,
    };
    let report = pipeline.report(&query).await;
    if !report.success {
        bail!(
            "{}",
            report.message.as_deref().unwrap_or("Erro ao gerar relatório")
        );
    }
    let mut message = format!(
        "{} report: {} transaction(s), balance {}",
        report.periodo,
        report.transacoes.len(),
        format_brl(report.saldo_periodo)
    );
    if let Some(top) = &report.categoria_mais_gasta {
        message.push_str(&format!(", most spent on {top}"));
    }
    Ok(Out::new(message, report))
}

fn finish(outcome: ActionOutcome) -> Result<Out<ActionOutcome>> {
    if !outcome.success {
        bail!("{}", outcome.message);
    }
    let message = match &outcome.identifier {
        Some(id) => format!("{} (id {id})", outcome.message),
        None => outcome.message.clone(),
    };
    Ok(Out::new(message, outcome))
}
