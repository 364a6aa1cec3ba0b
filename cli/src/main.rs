use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use dayflow::app::{self, App};
use dayflow::config::{ClientConfig, ConfigError, DEFAULT_BASE_URL, Timeouts};
use dayflow::hr::{Company, LeaveDraft, LeaveType, NewEmployee};
use dayflow::storage::StorageError;
use dayflow::{ApiError, AuthError, GuardDecision, History, LoginForm, Route, SignupForm, TransportKind};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

const DEFAULT_SESSION_FILE: &str = ".dayflow/session.json";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("session storage failed: {0}")]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("not logged in; run `dayflow-cli login` first")]
    NotLoggedIn,
    #[error("session expired; run `dayflow-cli login` again")]
    SessionExpired,
    #[error("{0} is not available to your role")]
    Forbidden(Route),
    #[error("unknown route: {0}")]
    UnknownRoute(String),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "dayflow-cli", about = "Dayflow HR client")]
struct Cli {
    #[arg(long, env = "DAYFLOW_API_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    #[arg(long, env = "DAYFLOW_TOKEN_TRANSPORT", default_value = "bearer")]
    transport: TransportKind,

    #[arg(long, env = "DAYFLOW_SESSION_FILE", default_value = DEFAULT_SESSION_FILE)]
    session_file: PathBuf,

    #[arg(long, env = "DAYFLOW_REQUEST_TIMEOUT_SECS", default_value_t = dayflow::config::DEFAULT_REQUEST_TIMEOUT_SECS)]
    request_timeout_secs: u64,

    #[arg(long, env = "DAYFLOW_CONNECT_TIMEOUT_SECS", default_value_t = dayflow::config::DEFAULT_CONNECT_TIMEOUT_SECS)]
    connect_timeout_secs: u64,

    #[arg(long, env = "DAYFLOW_LOGOUT_TIMEOUT_SECS", default_value_t = dayflow::config::DEFAULT_LOGOUT_TIMEOUT_SECS)]
    logout_timeout_secs: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in with an email or employee id.
    Login {
        identifier: String,
        #[arg(long, env = "DAYFLOW_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a company and its HR account.
    Signup(SignupArgs),
    Logout,
    /// Print the locally stored session without calling the backend.
    Whoami,
    Profile {
        /// JSON object of fields to change.
        #[arg(long)]
        update: Option<String>,
    },
    Employees(EmployeesCommand),
    Attendance(AttendanceCommand),
    Leave(LeaveCommand),
    Company {
        /// JSON object of fields to change.
        #[arg(long)]
        update: Option<String>,
    },
    /// Show what the route guard decides for an app path.
    Route { path: String },
}

impl Command {
    /// Commands that stand in for a protected view. Each CLI run is a cold
    /// start, so these confirm the stored session with the backend first.
    fn needs_session(&self) -> bool {
        matches!(
            self,
            Self::Profile { .. }
                | Self::Employees(_)
                | Self::Attendance(_)
                | Self::Leave(_)
                | Self::Company { .. }
        )
    }
}

#[derive(Args, Debug)]
struct SignupArgs {
    #[arg(long)]
    company_name: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    phone: String,
    #[arg(long, env = "DAYFLOW_PASSWORD", hide_env_values = true)]
    password: String,
    /// Defaults to `--password`.
    #[arg(long)]
    confirm_password: Option<String>,
}

#[derive(Args, Debug)]
struct EmployeesCommand {
    #[command(subcommand)]
    command: EmployeesSubcommand,
}

#[derive(Subcommand, Debug)]
enum EmployeesSubcommand {
    List,
    Show { id: String },
    Create(NewEmployeeArgs),
}

#[derive(Args, Debug)]
struct NewEmployeeArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    year_of_joining: i32,
    #[arg(long)]
    mobile: String,
    #[arg(long)]
    department: String,
    #[arg(long)]
    manager: String,
    #[arg(long)]
    location: String,
    #[arg(long)]
    job_position: String,
}

#[derive(Args, Debug)]
struct AttendanceCommand {
    #[command(subcommand)]
    command: AttendanceSubcommand,
}

#[derive(Subcommand, Debug)]
enum AttendanceSubcommand {
    CheckIn,
    CheckOut,
    /// Your own attendance.
    My {
        #[arg(long, help = "Day as YYYY-MM-DD")]
        date: Option<String>,
    },
    /// Company-wide attendance (HR only).
    Report {
        #[arg(long, help = "Day as YYYY-MM-DD")]
        date: Option<String>,
    },
}

#[derive(Args, Debug)]
struct LeaveCommand {
    #[command(subcommand)]
    command: LeaveSubcommand,
}

#[derive(Subcommand, Debug)]
enum LeaveSubcommand {
    List,
    Request {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long, value_enum, default_value_t = LeaveKind::Paid)]
        kind: LeaveKind,
        #[arg(long)]
        note: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LeaveKind {
    Paid,
    Sick,
    Unpaid,
}

impl From<LeaveKind> for LeaveType {
    fn from(kind: LeaveKind) -> Self {
        match kind {
            LeaveKind::Paid => Self::PaidTimeOff,
            LeaveKind::Sick => Self::SickLeave,
            LeaveKind::Unpaid => Self::UnpaidLeave,
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = client_config(&cli)?;
    let history = Arc::new(History::new());
    tracing::debug!(base_url = %config.base_url, transport = %config.transport, "starting");
    let app = App::bootstrap(&config, app::open_storage(&config)?, history.clone())?;

    let result = run(&app, cli.command).await;
    if history.hard_reloads() > 0 {
        return Err(CliError::SessionExpired);
    }
    result
}

fn client_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    let config = ClientConfig::new(&cli.base_url)?
        .with_transport(cli.transport)
        .with_session_file(&cli.session_file)
        .with_timeouts(Timeouts {
            request_secs: cli.request_timeout_secs,
            connect_secs: cli.connect_timeout_secs,
            logout_secs: cli.logout_timeout_secs,
        });
    Ok(config)
}

async fn run(app: &App, command: Command) -> Result<(), CliError> {
    if command.needs_session() {
        app.lifecycle().restore().await?;
    }
    match command {
        Command::Login { identifier, password } => {
            let user = app.lifecycle().login(LoginForm::new(identifier, password)).await?;
            eprintln!("logged in as {} ({})", user.identifier, user.role);
            Ok(())
        }
        Command::Signup(args) => run_signup(app, args).await,
        Command::Logout => {
            app.lifecycle().logout().await;
            eprintln!("logged out");
            Ok(())
        }
        Command::Whoami => {
            let session = app.session().snapshot();
            let user = session.user().ok_or(CliError::NotLoggedIn)?;
            print_json(user)
        }
        Command::Profile { update } => {
            guard(app, &Route::Profile)?;
            match update {
                Some(raw) => print_json(&app.hr().update_profile(&parse_object(&raw)?).await?),
                None => print_json(&app.hr().profile().await?),
            }
        }
        Command::Employees(employees) => run_employees(app, employees).await,
        Command::Attendance(attendance) => run_attendance(app, attendance).await,
        Command::Leave(leave) => run_leave(app, leave).await,
        Command::Company { update } => {
            guard(app, &Route::Company)?;
            match update {
                Some(raw) => {
                    let company: Company = serde_json::from_str(&raw)?;
                    print_json(&app.hr().update_company(&company).await?)
                }
                None => print_json(&app.hr().company().await?),
            }
        }
        Command::Route { path } => {
            let route = Route::parse(&path).ok_or_else(|| CliError::UnknownRoute(path.clone()))?;
            match app.visit(&route) {
                GuardDecision::Render(route) => println!("render {route}"),
                GuardDecision::Redirect(route) => println!("redirect {route}"),
            }
            Ok(())
        }
    }
}

async fn run_signup(app: &App, args: SignupArgs) -> Result<(), CliError> {
    let confirm_password = args.confirm_password.unwrap_or_else(|| args.password.clone());
    let form = SignupForm {
        company_name: args.company_name,
        name: args.name,
        email: args.email,
        phone: args.phone,
        password: args.password,
        confirm_password,
    };
    let response = app.lifecycle().signup(form).await?;
    if let Some(message) = &response.message {
        eprintln!("{message}");
    }
    match &response.user {
        Some(user) => print_json(user),
        None => Ok(()),
    }
}

async fn run_employees(app: &App, employees: EmployeesCommand) -> Result<(), CliError> {
    match employees.command {
        EmployeesSubcommand::List => {
            guard(app, &Route::Employees)?;
            print_json(&app.hr().employees().await?)
        }
        EmployeesSubcommand::Show { id } => {
            guard(app, &Route::Employee(id.clone()))?;
            print_json(&app.hr().employee(&id).await?)
        }
        EmployeesSubcommand::Create(args) => {
            guard(app, &Route::Employees)?;
            let employee = NewEmployee {
                first_name: args.first_name,
                last_name: args.last_name,
                email: args.email,
                year_of_joining: args.year_of_joining,
                mobile: args.mobile,
                department: args.department,
                manager: args.manager,
                location: args.location,
                job_position: args.job_position,
            };
            print_json(&app.hr().create_employee(&employee).await?)
        }
    }
}

async fn run_attendance(app: &App, attendance: AttendanceCommand) -> Result<(), CliError> {
    match attendance.command {
        AttendanceSubcommand::CheckIn => {
            guard(app, &Route::MyAttendance)?;
            app.hr().check_in().await?;
            eprintln!("checked in");
            Ok(())
        }
        AttendanceSubcommand::CheckOut => {
            guard(app, &Route::MyAttendance)?;
            app.hr().check_out().await?;
            eprintln!("checked out");
            Ok(())
        }
        AttendanceSubcommand::My { date } => {
            guard(app, &Route::MyAttendance)?;
            print_json(&app.hr().my_attendance(date.as_deref()).await?)
        }
        AttendanceSubcommand::Report { date } => {
            guard(app, &Route::Attendance)?;
            print_json(&app.hr().attendance_report(date.as_deref()).await?)
        }
    }
}

async fn run_leave(app: &App, leave: LeaveCommand) -> Result<(), CliError> {
    guard(app, &Route::TimeOff)?;
    match leave.command {
        LeaveSubcommand::List => print_json(&app.hr().my_leaves().await?),
        LeaveSubcommand::Request { start, end, kind, note } => {
            let draft = LeaveDraft {
                start_date: start,
                end_date: end,
                leave_type: kind.into(),
                attendance_note: note,
            };
            print_json(&app.hr().request_leave(&draft).await?)
        }
    }
}

/// Run the route guard for the view a command stands in for.
fn guard(app: &App, route: &Route) -> Result<(), CliError> {
    match app.visit(route) {
        GuardDecision::Render(_) => Ok(()),
        GuardDecision::Redirect(Route::Login) => Err(CliError::NotLoggedIn),
        GuardDecision::Redirect(_) => Err(CliError::Forbidden(route.clone())),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

fn parse_object(raw: &str) -> Result<Map<String, Value>, CliError> {
    Ok(serde_json::from_str(raw)?)
}
