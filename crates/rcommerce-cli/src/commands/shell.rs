//! Interactive shell for rcommerce
//!
//! Provides a command-line interface for managing jobs through an
//! interactive REPL, driven by an in-process `Scheduler`.

use std::io::{self, Write};
use std::sync::Arc;

use colored::Colorize;
use dialoguer::{Confirm, Input, Select};
use uuid::Uuid;

use rcommerce_core::jobs::clock::Clock;
use rcommerce_core::jobs::job::{JobFilter, JobKind, JobStatus, NewJob, Page, Schedule};
use rcommerce_core::jobs::queue::DispatchQueueBackend;
use rcommerce_core::jobs::store::JobStoreBackend;
use rcommerce_core::jobs::Scheduler;
use rcommerce_core::Result;

const DEFAULT_OWNER: &str = "cli";

/// Shell command parser result
#[derive(Debug, Clone)]
pub enum ShellCommand {
    Help,
    List { limit: Option<usize> },
    Get { id: String },
    Create,
    Pause { id: String },
    Resume { id: String },
    Trigger { id: String },
    Delete { id: String },
    Executions { id: String },
    Status,
    Clear,
    Exit,
    Empty,
    Unknown(String),
}

/// Main shell state
pub struct Shell<S, Q, C>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    scheduler: Arc<Scheduler<S, Q, C>>,
    running: bool,
    prompt: String,
    owner: String,
}

impl<S, Q, C> Shell<S, Q, C>
where
    S: JobStoreBackend,
    Q: DispatchQueueBackend,
    C: Clock,
{
    pub fn new(scheduler: Arc<Scheduler<S, Q, C>>) -> Self {
        Self { scheduler, running: true, prompt: "rcommerce> ".to_string(), owner: DEFAULT_OWNER.to_string() }
    }

    /// Run the interactive shell
    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        while self.running {
            print!("{}", self.prompt.bright_cyan());
            io::stdout().flush().unwrap();

            let mut input = String::new();
            match io::stdin().read_line(&mut input) {
                Ok(_) => {
                    let command = self.parse_command(&input);
                    if let Err(e) = self.execute_command(command).await {
                        eprintln!("{} {}", "Error:".red().bold(), e);
                    }
                }
                Err(e) => {
                    eprintln!("{} {}", "Input error:".red(), e);
                }
            }
        }

        println!("\n{}\n", "Bye.".green().bold());
        Ok(())
    }

    fn parse_command(&self, input: &str) -> ShellCommand {
        let trimmed = input.trim();

        if trimmed.is_empty() {
            return ShellCommand::Empty;
        }

        let parts: Vec<&str> = trimmed.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "help" | "h" | "?" => ShellCommand::Help,
            "quit" | "exit" | "q" => ShellCommand::Exit,
            "clear" | "cls" => ShellCommand::Clear,
            "status" | "st" => ShellCommand::Status,

            "list" | "ls" => {
                let limit = parts.get(1).and_then(|s| s.parse().ok());
                ShellCommand::List { limit }
            }

            "get" | "show" | "view" => {
                if parts.len() < 2 {
                    ShellCommand::Unknown("Usage: get <job-id>".to_string())
                } else {
                    ShellCommand::Get { id: parts[1].to_string() }
                }
            }

            "create" | "new" | "add" => ShellCommand::Create,

            "pause" => {
                if parts.len() < 2 {
                    ShellCommand::Unknown("Usage: pause <job-id>".to_string())
                } else {
                    ShellCommand::Pause { id: parts[1].to_string() }
                }
            }

            "resume" => {
                if parts.len() < 2 {
                    ShellCommand::Unknown("Usage: resume <job-id>".to_string())
                } else {
                    ShellCommand::Resume { id: parts[1].to_string() }
                }
            }

            "trigger" | "run" => {
                if parts.len() < 2 {
                    ShellCommand::Unknown("Usage: trigger <job-id>".to_string())
                } else {
                    ShellCommand::Trigger { id: parts[1].to_string() }
                }
            }

            "delete" | "del" | "rm" => {
                if parts.len() < 2 {
                    ShellCommand::Unknown("Usage: delete <job-id>".to_string())
                } else {
                    ShellCommand::Delete { id: parts[1].to_string() }
                }
            }

            "executions" | "runs" => {
                if parts.len() < 2 {
                    ShellCommand::Unknown("Usage: executions <job-id>".to_string())
                } else {
                    ShellCommand::Executions { id: parts[1].to_string() }
                }
            }

            _ => ShellCommand::Unknown(format!("Unknown command: '{}' (type 'help' for available commands)", cmd)),
        }
    }

    async fn execute_command(&mut self, command: ShellCommand) -> Result<()> {
        match command {
            ShellCommand::Empty => {}
            ShellCommand::Help => self.print_help(),
            ShellCommand::Exit => self.running = false,
            ShellCommand::Clear => self.clear_screen(),
            ShellCommand::Status => self.show_status().await?,
            ShellCommand::List { limit } => self.list_jobs(limit).await?,
            ShellCommand::Get { id } => self.get_job(&id).await?,
            ShellCommand::Create => self.create_job_interactive().await?,
            ShellCommand::Pause { id } => self.pause_job(&id).await?,
            ShellCommand::Resume { id } => self.resume_job(&id).await?,
            ShellCommand::Trigger { id } => self.trigger_job(&id).await?,
            ShellCommand::Delete { id } => self.delete_job(&id).await?,
            ShellCommand::Executions { id } => self.show_executions(&id).await?,
            ShellCommand::Unknown(msg) => println!("{} {}", "Error:".red(), msg),
        }

        Ok(())
    }

    fn print_welcome(&self) {
        println!("\n{}", "rcommerce interactive job shell".bright_cyan().bold());
        println!("{}", "Type 'help' for available commands or 'exit' to quit\n".bright_cyan());
    }

    fn print_help(&self) {
        println!("\n{}", "Available Commands:".bold().underline());
        println!();
        println!("  {:<25} {}", "help, h, ?", "Show this help message");
        println!("  {:<25} {}", "exit, quit, q", "Exit the shell");
        println!("  {:<25} {}", "clear, cls", "Clear the screen");
        println!("  {:<25} {}", "status, st", "Show scheduler status");
        println!();
        println!("{}", "Jobs:".cyan().bold());
        println!("  {:<25} {}", "list [limit]", "List jobs");
        println!("  {:<25} {}", "get <job-id>", "Show job details");
        println!("  {:<25} {}", "create", "Create a new job interactively");
        println!("  {:<25} {}", "pause <job-id>", "Pause a job");
        println!("  {:<25} {}", "resume <job-id>", "Resume a paused job");
        println!("  {:<25} {}", "trigger <job-id>", "Manually trigger a job");
        println!("  {:<25} {}", "delete <job-id>", "Delete a job");
        println!("  {:<25} {}", "executions <job-id>", "Show recent executions");
        println!();
    }

    fn clear_screen(&self) {
        print!("\x1B[2J\x1B[1;1H");
        io::stdout().flush().unwrap();
    }

    async fn list_jobs(&self, limit: Option<usize>) -> Result<()> {
        let mut page = Page::default();
        if let Some(limit) = limit {
            page.limit = limit as i64;
        }

        let result = self
            .scheduler
            .list_jobs(&self.owner, &JobFilter::default(), &page)
            .await
            .map_err(rcommerce_core::Error::from)?;

        if result.items.is_empty() {
            println!("{}", "No jobs found.".yellow());
            return Ok(());
        }

        println!(
            "{:<38} {:<24} {:<10} {:<10}",
            "ID".bold(),
            "NAME".bold(),
            "KIND".bold(),
            "STATUS".bold()
        );
        for job in &result.items {
            println!("{:<38} {:<24} {:<10} {:<10}", job.id, job.name, job.kind, job.status);
        }
        println!("\n{} of {} total", result.items.len(), result.total);

        Ok(())
    }

    async fn get_job(&self, id: &str) -> Result<()> {
        let job_id = parse_uuid(id)?;
        let job = self.scheduler.get_job(&self.owner, job_id).await.map_err(rcommerce_core::Error::from)?;

        println!("{}", "Job".bold().underline());
        println!("  ID:          {}", job.id);
        println!("  Name:        {}", job.name);
        println!("  Kind:        {}", job.kind);
        println!("  Status:      {}", job.status);
        println!("  Schedule:    {:?}", job.schedule());
        println!("  Next run:    {}", job.next_run.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string()));
        println!("  Retries:     {}/{}", job.retry_count, job.max_retries);
        println!("  Payload:     {}", job.payload);

        Ok(())
    }

    async fn create_job_interactive(&self) -> Result<()> {
        let name: String = Input::new().with_prompt("Job name").interact_text().unwrap();

        let kinds = vec!["one_time", "recurring"];
        let kind_idx = Select::new().with_prompt("Kind").items(&kinds).default(0).interact().unwrap();

        let (kind, schedule) = if kind_idx == 0 {
            let schedule = if Confirm::new().with_prompt("Run immediately?").default(true).interact().unwrap() {
                Schedule::Immediate
            } else {
                let at: String = Input::new().with_prompt("Run at (RFC3339)").interact_text().unwrap();
                let at = chrono::DateTime::parse_from_rfc3339(&at)
                    .map_err(|e| rcommerce_core::Error::validation(format!("invalid timestamp: {}", e)))?
                    .with_timezone(&chrono::Utc);
                Schedule::At { at }
            };
            (JobKind::OneTime, schedule)
        } else {
            let expression: String = Input::new().with_prompt("Cron expression").interact_text().unwrap();
            (JobKind::Recurring, Schedule::Cron { expression })
        };

        let new_job = NewJob {
            name,
            description: None,
            kind,
            schedule,
            payload: serde_json::json!({}),
            timeout_secs: None,
            max_retries: None,
        };

        let job = self.scheduler.create_job(&self.owner, new_job).await.map_err(rcommerce_core::Error::from)?;
        println!("{} created job {}", "OK:".green().bold(), job.id);

        Ok(())
    }

    async fn pause_job(&self, id: &str) -> Result<()> {
        let job_id = parse_uuid(id)?;
        self.scheduler.pause_job(&self.owner, job_id).await.map_err(rcommerce_core::Error::from)?;
        println!("{} paused job {}", "OK:".green().bold(), id);
        Ok(())
    }

    async fn resume_job(&self, id: &str) -> Result<()> {
        let job_id = parse_uuid(id)?;
        self.scheduler.resume_job(&self.owner, job_id).await.map_err(rcommerce_core::Error::from)?;
        println!("{} resumed job {}", "OK:".green().bold(), id);
        Ok(())
    }

    async fn trigger_job(&self, id: &str) -> Result<()> {
        let job_id = parse_uuid(id)?;
        self.scheduler.trigger_job(&self.owner, job_id).await.map_err(rcommerce_core::Error::from)?;
        println!("{} queued job {} for immediate execution", "OK:".green().bold(), id);
        Ok(())
    }

    async fn delete_job(&self, id: &str) -> Result<()> {
        if !Confirm::new().with_prompt(format!("Delete job {}?", id)).default(false).interact().unwrap() {
            println!("Aborted.");
            return Ok(());
        }

        let job_id = parse_uuid(id)?;
        self.scheduler.delete_job(&self.owner, job_id).await.map_err(rcommerce_core::Error::from)?;
        println!("{} deleted job {}", "OK:".green().bold(), id);
        Ok(())
    }

    async fn show_executions(&self, id: &str) -> Result<()> {
        let job_id = parse_uuid(id)?;
        let page = Page::default();
        let result =
            self.scheduler.get_executions(&self.owner, job_id, &page).await.map_err(rcommerce_core::Error::from)?;

        if result.items.is_empty() {
            println!("{}", "No executions found.".yellow());
            return Ok(());
        }

        println!("{:<38} {:<20} {:<10} {:<10}", "ID".bold(), "STARTED".bold(), "STATUS".bold(), "DURATION".bold());
        for exec in &result.items {
            let duration = exec.duration_ms.map(|ms| format!("{}ms", ms)).unwrap_or_else(|| "-".to_string());
            println!("{:<38} {:<20} {:<10} {:<10}", exec.id, exec.started_at, exec.status, duration);
        }

        Ok(())
    }

    async fn show_status(&self) -> Result<()> {
        let page = Page { limit: 1, ..Page::default() };
        let active = JobFilter { status: Some(JobStatus::Active), kind: None };
        let result = self.scheduler.list_jobs(&self.owner, &active, &page).await.map_err(rcommerce_core::Error::from)?;

        println!("{}", "Scheduler Status".bold().underline());
        println!("  Active jobs (this tenant): {}", result.total);

        Ok(())
    }
}

fn parse_uuid(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id).map_err(|e| rcommerce_core::Error::validation(format!("invalid job id: {}", e)))
}
