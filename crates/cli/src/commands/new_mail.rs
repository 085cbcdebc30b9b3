use chrono::{NaiveDate, Utc};
use clap::Args;
use parapheur_core::{CircuitId, CorrespondenceDossier, MailKind, RequestKind, UserId};
use parapheur_db::{NewDocument, NewRequest, WorkflowService};

use crate::commands::{classify_service_error, with_pool, CommandResult};
use crate::commands::new_credit::parse_priority;

#[derive(Debug, Args)]
pub struct NewMailArgs {
    #[arg(long, help = "Workflow type code", default_value = "COU")]
    pub r#type: String,
    #[arg(long, help = "User id of the registering agent")]
    pub user: String,
    #[arg(long, help = "Request subject line")]
    pub subject: String,
    #[arg(long, help = "Sender of the correspondence")]
    pub sender: String,
    #[arg(long, help = "Originating institution or branch")]
    pub origin: Option<String>,
    #[arg(
        long,
        help = "Mail kind: letter, email, report, invoice, request, notification or other",
        default_value = "letter"
    )]
    pub kind: String,
    #[arg(long, help = "Reception date (YYYY-MM-DD); defaults to today")]
    pub received_on: Option<NaiveDate>,
    #[arg(long, help = "Priority: normal, urgent or critical", default_value = "normal")]
    pub priority: String,
    #[arg(long, help = "Processing instruction for the reviewers")]
    pub instruction: Option<String>,
    #[arg(long, help = "Circuit id to route the correspondence through")]
    pub circuit: String,
    #[arg(long = "document", help = "Attachment name; repeatable")]
    pub documents: Vec<String>,
}

pub fn run(args: NewMailArgs) -> CommandResult {
    let mail_kind = match parse_mail_kind(&args.kind) {
        Ok(kind) => kind,
        Err(message) => return CommandResult::failure("new-mail", "invalid_argument", message, 2),
    };
    let priority = match parse_priority(&args.priority) {
        Ok(priority) => priority,
        Err(message) => return CommandResult::failure("new-mail", "invalid_argument", message, 2),
    };

    with_pool("new-mail", |pool, config| async move {
        let service = WorkflowService::new(pool)
            .with_reference_fallback(config.workflow.fallback_reference_code.clone());

        let input = NewRequest {
            workflow_type_code: args.r#type,
            requester: UserId(args.user),
            subject: args.subject,
            description: None,
            kind: RequestKind::Correspondence(CorrespondenceDossier {
                sender: args.sender,
                origin: args.origin,
                mail_kind,
                received_on: args.received_on.unwrap_or_else(|| Utc::now().date_naive()),
                priority,
                instruction: args.instruction,
            }),
            circuit: Some(CircuitId(args.circuit)),
            documents: args
                .documents
                .into_iter()
                .map(|name| NewDocument { name, mime_type: None, size_bytes: None })
                .collect(),
        };

        let request = service.create_request(input).await.map_err(classify_service_error)?;
        Ok(format!("registered draft {}", request.reference))
    })
}

fn parse_mail_kind(value: &str) -> Result<MailKind, String> {
    match value.to_ascii_lowercase().as_str() {
        "letter" => Ok(MailKind::Letter),
        "email" => Ok(MailKind::Email),
        "report" => Ok(MailKind::Report),
        "invoice" => Ok(MailKind::Invoice),
        "request" => Ok(MailKind::Request),
        "notification" => Ok(MailKind::Notification),
        "other" => Ok(MailKind::Other),
        other => Err(format!(
            "`{other}` is not a mail kind (letter, email, report, invoice, request, notification, other)"
        )),
    }
}
