use std::{error::Error, io, time::Duration};

use clap::Parser;
use wiresql::{
    ClientConfig, Connection, HttpTransport, RetryPolicy, SqlStatement, StatementKind, Transport,
    cli::{Command, PromptError, prompt},
};

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Server endpoint, e.g. http://localhost:8080/sql
    endpoint: String,
    /// Shared secret used to answer the login challenge
    #[arg(long, env = "WIRESQL_SECRET", hide_env_values = true)]
    secret: String,
    /// Total attempts per statement
    #[arg(long, default_value_t = RetryPolicy::DEFAULT_MAX_RETRIES)]
    retries: u32,
    /// Delay between attempts in milliseconds
    #[arg(long, default_value_t = 30_000)]
    retry_interval_ms: u64,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize env_logger; For logging to STDOUT/STDERR
    env_logger::init();

    let cli = Cli::parse();
    let retry = RetryPolicy::new(cli.retries, Duration::from_millis(cli.retry_interval_ms))?;
    let transport = HttpTransport::new(&cli.endpoint)?;
    let mut conn = Connection::open(transport, ClientConfig::new(cli.secret).with_retry(retry))?;

    let result = shell(&mut conn);
    conn.close()?;
    result
}

fn shell<T: Transport>(conn: &mut Connection<T>) -> Result<(), Box<dyn Error>> {
    let mut stdin = io::stdin().lock();
    let mut stdout = io::stdout().lock();

    loop {
        let cmd = match prompt(&mut stdin, &mut stdout) {
            Ok(cmd) => cmd,
            Err(PromptError::Io(e)) => return Err(e.into()),
            Err(e) => {
                eprintln!("{e}");
                continue;
            }
        };

        let outcome = match cmd {
            Command::Exit => break,
            Command::Begin => conn.begin_transaction().map(|_| "BEGIN".to_string()),
            Command::Commit => conn.commit().map(|_| "COMMIT".to_string()),
            Command::Rollback => conn.rollback().map(|_| "ROLLBACK".to_string()),
            Command::Statement(s) if s.is_empty() => continue,
            Command::Statement(s) => {
                let statement = SqlStatement::new(s);
                match statement.kind() {
                    StatementKind::Select => conn.table_query(statement).map(|t| t.to_string()),
                    StatementKind::Command => conn
                        .command(statement)
                        .map(|rows| format!("{rows} row(s) affected")),
                }
            }
        };

        match outcome {
            Ok(out) => println!("{out}"),
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}
