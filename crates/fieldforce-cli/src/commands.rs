//! Command handlers. Each prints its result as JSON on stdout and status
//! lines on stderr.

use std::io::{self, BufRead, Write};

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use fieldforce_core::auth::guard;
use fieldforce_core::models::workflow::{dcr_actions, expense_actions, leave_actions, tour_actions};
use fieldforce_core::models::{ListParams, ReviewAction, User};
use fieldforce_core::{ApiClient, Config};

use crate::fields::{self, Fields};
use crate::Args;

pub async fn run(client: &ApiClient, config: &mut Config, args: &Args) -> Result<()> {
    match args.command.as_str() {
        "login" => login(client, config, args.rest.first().cloned()).await,
        "logout" => {
            client.session().logout();
            eprintln!("Logged out");
            Ok(())
        }
        "whoami" => print_json(&guard::require_session(client.session()).await?),
        "status" => status(client, config),
        "dashboard" => dashboard(client).await,
        "leaves" => leaves(client, args).await,
        "expenses" => expenses(client, args).await,
        "tours" => tours(client, args).await,
        "dcrs" => dcrs(client, args).await,
        "doctors" => doctors(client, args).await,
        "chemists" => chemists(client, args).await,
        "notifications" => notifications(client, args).await,
        "reports" => reports(client, args).await,
        other => bail!("Unknown command: {} (see `fieldforce help`)", other),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn subcommand(args: &Args) -> &str {
    args.rest.first().map(String::as_str).unwrap_or("list")
}

fn id_arg(args: &Args) -> Result<i64> {
    let raw = args
        .rest
        .get(1)
        .ok_or_else(|| anyhow!("{} {} requires an ID", args.command, subcommand(args)))?;
    raw.parse().with_context(|| format!("Invalid ID: {}", raw))
}

/// `list [page]`, with the page at position `index`.
fn page_params(args: &Args, index: usize) -> Result<ListParams> {
    let mut params = ListParams::new();
    if let Some(raw) = args.rest.get(index) {
        let page = raw.parse().with_context(|| format!("Invalid page: {}", raw))?;
        params = params.page(page);
    }
    Ok(params)
}

/// `key=value` fields from position `index` on.
fn fields_from(args: &Args, index: usize) -> Result<Fields> {
    Fields::parse(args.rest.get(index..).unwrap_or_default())
}

fn comments(args: &Args) -> &str {
    args.comments.as_deref().unwrap_or_default()
}

/// Refuse actions the record does not offer to this user.
fn ensure_allowed(requested: ReviewAction, available: &[ReviewAction]) -> Result<()> {
    if available.contains(&requested) {
        Ok(())
    } else {
        bail!(
            "{:?} is not available for this record (available: {:?})",
            requested,
            available
        )
    }
}

fn review_action(args: &Args) -> Result<ReviewAction> {
    let name = subcommand(args);
    ReviewAction::parse(name).ok_or_else(|| anyhow!("Unknown {} command: {}", args.command, name))
}

async fn login(client: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => prompt("Email: ")?,
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))
        .context("Failed to read password")?;

    let session = client.session().login(&email, &password).await?;
    config.last_email = Some(email);
    config.save()?;

    let name = session
        .user
        .as_ref()
        .map(User::full_name)
        .unwrap_or_else(|| "user".to_string());
    eprintln!("Logged in as {}", name);
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("No value entered");
    }
    Ok(value)
}

fn status(client: &ApiClient, config: &Config) -> Result<()> {
    let session = client.session();
    print_json(&json!({
        "authenticated": session.is_authenticated(),
        "user": session.current_user(),
        "last_email": config.last_email,
        "api_base_url": config.api_base_url,
        "login_url": session.endpoints().login_url(),
        "token_store": config.token_store,
    }))
}

async fn dashboard(client: &ApiClient) -> Result<()> {
    guard::require_session(client.session()).await?;
    let (dashboard, unread) = futures::try_join!(client.dashboard(), client.unread_notification_count())?;
    print_json(&json!({
        "dashboard": dashboard,
        "unread_notifications": unread,
    }))
}

async fn leaves(client: &ApiClient, args: &Args) -> Result<()> {
    let user = guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_leave_requests(&page_params(args, 1)?).await?),
        "types" => print_json(&client.leave_types().await?),
        "show" => {
            let leave = client.get_leave_request(id_arg(args)?).await?;
            print_json(&json!({"leave": leave, "actions": action_names(&leave_actions(&user, &leave))}))
        }
        "new" => {
            let created = client.create_leave_request(&fields::new_leave(fields_from(args, 1)?)?).await?;
            eprintln!("Leave request {} submitted", created.id);
            print_json(&created)
        }
        "edit" => {
            let id = id_arg(args)?;
            let update = fields::leave_update(fields_from(args, 2)?)?;
            print_json(&client.update_leave_request(id, &update).await?)
        }
        _ => {
            let action = review_action(args)?;
            let id = id_arg(args)?;
            let leave = client.get_leave_request(id).await?;
            ensure_allowed(action, &leave_actions(&user, &leave))?;
            let updated = match action {
                ReviewAction::Approve => client.approve_leave_request(id, comments(args)).await?,
                ReviewAction::Reject => client.reject_leave_request(id, comments(args)).await?,
                ReviewAction::Cancel => client.cancel_leave_request(id).await?,
                other => bail!("{:?} does not apply to leave requests", other),
            };
            eprintln!("Leave request {} is now {}", id, updated.status.as_str());
            print_json(&updated)
        }
    }
}

async fn expenses(client: &ApiClient, args: &Args) -> Result<()> {
    let user = guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_expense_claims(&page_params(args, 1)?).await?),
        "types" => print_json(&client.expense_types().await?),
        "show" => {
            let claim = client.get_expense_claim(id_arg(args)?).await?;
            print_json(&json!({"claim": claim, "actions": action_names(&expense_actions(&user, &claim))}))
        }
        "new" => {
            let form = fields::expense_form(fields_from(args, 1)?, true)?;
            let created = client.create_expense_claim(&form).await?;
            eprintln!("Expense claim {} submitted", created.id);
            print_json(&created)
        }
        "edit" => {
            let id = id_arg(args)?;
            let form = fields::expense_form(fields_from(args, 2)?, false)?;
            print_json(&client.update_expense_claim(id, &form).await?)
        }
        _ => {
            let action = review_action(args)?;
            let id = id_arg(args)?;
            let claim = client.get_expense_claim(id).await?;
            ensure_allowed(action, &expense_actions(&user, &claim))?;
            let updated = match action {
                ReviewAction::Approve => client.approve_expense_claim(id, comments(args)).await?,
                ReviewAction::Reject => client.reject_expense_claim(id, comments(args)).await?,
                ReviewAction::Query => client.query_expense_claim(id, comments(args)).await?,
                ReviewAction::Cancel => client.cancel_expense_claim(id).await?,
                other => bail!("{:?} does not apply to expense claims", other),
            };
            eprintln!("Expense claim {} is now {}", id, updated.status.as_str());
            print_json(&updated)
        }
    }
}

async fn tours(client: &ApiClient, args: &Args) -> Result<()> {
    let user = guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_tour_programs(&page_params(args, 1)?).await?),
        "show" => {
            let tour = client.get_tour_program(id_arg(args)?).await?;
            print_json(&json!({
                "tour": tour,
                "period": tour.period(),
                "actions": action_names(&tour_actions(&user, &tour)),
            }))
        }
        "new" => {
            let created = client.create_tour_program(&fields::new_tour(fields_from(args, 1)?)?).await?;
            eprintln!("Tour program for {} saved as draft", created.period());
            print_json(&created)
        }
        "edit" => {
            let id = id_arg(args)?;
            let update = fields::tour_update(fields_from(args, 2)?)?;
            let tour = client.get_tour_program(id).await?;
            ensure_allowed(ReviewAction::Edit, &tour_actions(&user, &tour))?;
            print_json(&client.update_tour_program(id, &update).await?)
        }
        _ => {
            let action = review_action(args)?;
            let id = id_arg(args)?;
            let tour = client.get_tour_program(id).await?;
            ensure_allowed(action, &tour_actions(&user, &tour))?;
            let updated = match action {
                ReviewAction::Submit => client.submit_tour_program(id).await?,
                ReviewAction::Approve => client.approve_tour_program(id, comments(args)).await?,
                ReviewAction::Reject => client.reject_tour_program(id, comments(args)).await?,
                other => bail!("{:?} does not apply to tour programs", other),
            };
            eprintln!("Tour program for {} is now {}", updated.period(), updated.status.as_str());
            print_json(&updated)
        }
    }
}

async fn dcrs(client: &ApiClient, args: &Args) -> Result<()> {
    let user = guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_daily_call_reports(&page_params(args, 1)?).await?),
        "show" => {
            let dcr = client.get_daily_call_report(id_arg(args)?).await?;
            print_json(&json!({
                "report": dcr,
                "total_calls": dcr.total_calls(),
                "actions": action_names(&dcr_actions(&user, &dcr)),
            }))
        }
        "new" => {
            let created = client.create_daily_call_report(&fields::new_dcr(fields_from(args, 1)?)?).await?;
            eprintln!("Daily call report {} saved ({} calls)", created.id, created.total_calls());
            print_json(&created)
        }
        "edit" => {
            let id = id_arg(args)?;
            let update = fields::dcr_update(fields_from(args, 2)?)?;
            let dcr = client.get_daily_call_report(id).await?;
            ensure_allowed(ReviewAction::Edit, &dcr_actions(&user, &dcr))?;
            print_json(&client.update_daily_call_report(id, &update).await?)
        }
        "delete" => {
            let id = id_arg(args)?;
            let dcr = client.get_daily_call_report(id).await?;
            ensure_allowed(ReviewAction::Delete, &dcr_actions(&user, &dcr))?;
            client.delete_daily_call_report(id).await?;
            eprintln!("Daily call report {} deleted", id);
            Ok(())
        }
        other => bail!("Unknown dcrs command: {}", other),
    }
}

async fn doctors(client: &ApiClient, args: &Args) -> Result<()> {
    guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_doctors(&page_params(args, 1)?).await?),
        "show" => print_json(&client.get_doctor(id_arg(args)?).await?),
        "specialties" => print_json(&client.doctor_specialties().await?),
        "new" => {
            let input = fields::contact(fields_from(args, 1)?, "specialty", true)?;
            print_json(&client.create_doctor(&input).await?)
        }
        "edit" => {
            let id = id_arg(args)?;
            let input = fields::contact(fields_from(args, 2)?, "specialty", false)?;
            print_json(&client.update_doctor(id, &input).await?)
        }
        "delete" => {
            let id = id_arg(args)?;
            client.delete_doctor(id).await?;
            eprintln!("Doctor {} removed", id);
            Ok(())
        }
        other => bail!("Unknown doctors command: {}", other),
    }
}

async fn chemists(client: &ApiClient, args: &Args) -> Result<()> {
    guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_chemists(&page_params(args, 1)?).await?),
        "show" => print_json(&client.get_chemist(id_arg(args)?).await?),
        "categories" => print_json(&client.chemist_categories().await?),
        "new" => {
            let input = fields::contact(fields_from(args, 1)?, "category", true)?;
            print_json(&client.create_chemist(&input).await?)
        }
        "edit" => {
            let id = id_arg(args)?;
            let input = fields::contact(fields_from(args, 2)?, "category", false)?;
            print_json(&client.update_chemist(id, &input).await?)
        }
        "delete" => {
            let id = id_arg(args)?;
            client.delete_chemist(id).await?;
            eprintln!("Chemist {} removed", id);
            Ok(())
        }
        other => bail!("Unknown chemists command: {}", other),
    }
}

async fn notifications(client: &ApiClient, args: &Args) -> Result<()> {
    guard::require_session(client.session()).await?;
    match subcommand(args) {
        "list" => print_json(&client.list_notifications(&page_params(args, 1)?).await?),
        "read" => {
            let status = client.mark_notification_read(id_arg(args)?).await?;
            eprintln!("{}", status.status);
            Ok(())
        }
        "read-all" => {
            let status = client.mark_all_notifications_read().await?;
            eprintln!("{}", status.status);
            Ok(())
        }
        other => bail!("Unknown notifications command: {}", other),
    }
}

async fn reports(client: &ApiClient, args: &Args) -> Result<()> {
    let user = guard::require_role(client.session(), |u| u.is_manager() || u.is_admin()).await?;
    debug!(user_id = user.id, "Running report");

    let mut params = ListParams::new();
    if let (Some(start), Some(end)) = (args.rest.get(1), args.rest.get(2)) {
        params = params.between(parse_date(start)?, parse_date(end)?);
    }
    match args.rest.first().map(String::as_str).unwrap_or("dcr") {
        "dcr" => print_json(&client.dcr_summary(&params).await?),
        "expense" => print_json(&client.expense_summary(&params).await?),
        "leave" => print_json(&client.leave_summary(&params).await?),
        "performance" => print_json(&client.performance_report(&params).await?),
        other => bail!("Unknown report: {}", other),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("Invalid date (use YYYY-MM-DD): {}", raw))
}

fn action_names(actions: &[ReviewAction]) -> Vec<String> {
    actions.iter().map(|a| format!("{:?}", a).to_lowercase()).collect()
}
