use clap::Args;
use parapheur_core::{CreditDossier, CreditKind, Priority, RequestKind, UserId};
use parapheur_db::{NewDocument, NewRequest, WorkflowService};
use rust_decimal::Decimal;

use crate::commands::{classify_service_error, with_pool, CommandResult};

#[derive(Debug, Args)]
pub struct NewCreditArgs {
    #[arg(long, help = "Workflow type code", default_value = "CRD")]
    pub r#type: String,
    #[arg(long, help = "User id of the requesting agent")]
    pub user: String,
    #[arg(long, help = "Request subject line")]
    pub subject: String,
    #[arg(long, help = "Free-form description")]
    pub description: Option<String>,
    #[arg(long, help = "Client number")]
    pub client: String,
    #[arg(long, help = "Account number")]
    pub account: String,
    #[arg(long, help = "Client display name")]
    pub client_name: String,
    #[arg(long, help = "Credit kind: salary, housing, consumption, business or other")]
    pub kind: String,
    #[arg(long, help = "Requested amount, e.g. 12000000 or 12000000.50")]
    pub amount: String,
    #[arg(long, help = "ISO currency code; defaults to the configured currency")]
    pub currency: Option<String>,
    #[arg(long, help = "Duration in months")]
    pub duration: Option<u32>,
    #[arg(long, help = "Priority: normal, urgent or critical", default_value = "normal")]
    pub priority: String,
    #[arg(long = "document", help = "Attachment name; repeatable")]
    pub documents: Vec<String>,
}

pub fn run(args: NewCreditArgs) -> CommandResult {
    let credit_kind = match parse_credit_kind(&args.kind) {
        Ok(kind) => kind,
        Err(message) => {
            return CommandResult::failure("new-credit", "invalid_argument", message, 2)
        }
    };
    let priority = match parse_priority(&args.priority) {
        Ok(priority) => priority,
        Err(message) => {
            return CommandResult::failure("new-credit", "invalid_argument", message, 2)
        }
    };
    let amount = match args.amount.parse::<Decimal>() {
        Ok(amount) => amount,
        Err(_) => {
            return CommandResult::failure(
                "new-credit",
                "invalid_argument",
                format!("`{}` is not a valid amount", args.amount),
                2,
            );
        }
    };

    with_pool("new-credit", |pool, config| async move {
        let service = WorkflowService::new(pool)
            .with_reference_fallback(config.workflow.fallback_reference_code.clone());
        let currency =
            args.currency.unwrap_or_else(|| config.workflow.default_currency.clone());

        let input = NewRequest {
            workflow_type_code: args.r#type,
            requester: UserId(args.user),
            subject: args.subject,
            description: args.description,
            kind: RequestKind::Credit(CreditDossier {
                client_number: args.client,
                account_number: args.account,
                client_name: args.client_name,
                credit_kind,
                amount,
                currency,
                duration_months: args.duration,
                priority,
            }),
            circuit: None,
            documents: args
                .documents
                .into_iter()
                .map(|name| NewDocument { name, mime_type: None, size_bytes: None })
                .collect(),
        };

        let request = service.create_request(input).await.map_err(classify_service_error)?;
        Ok(format!(
            "registered draft {} (circuit: {})",
            request.reference,
            request.circuit_id.as_ref().map_or("unassigned", |c| c.0.as_str()),
        ))
    })
}

pub(crate) fn parse_priority(value: &str) -> Result<Priority, String> {
    match value.to_ascii_lowercase().as_str() {
        "normal" => Ok(Priority::Normal),
        "urgent" => Ok(Priority::Urgent),
        "critical" => Ok(Priority::Critical),
        other => Err(format!("`{other}` is not a priority (normal, urgent, critical)")),
    }
}

fn parse_credit_kind(value: &str) -> Result<CreditKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "salary" => Ok(CreditKind::Salary),
        "housing" => Ok(CreditKind::Housing),
        "consumption" => Ok(CreditKind::Consumption),
        "business" => Ok(CreditKind::Business),
        "other" => Ok(CreditKind::Other),
        other => Err(format!(
            "`{other}` is not a credit kind (salary, housing, consumption, business, other)"
        )),
    }
}
