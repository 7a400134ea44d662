use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use common::{parse_param, JobInfo, Mapping, Params, SubmitConf};
use jobserver_client::{ClientConfig, ClientRegistry, ConfigLayer, JobServerClient};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (.yaml, .yml or .toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Job server URL, overrides config and JOBSERVER_URL
    #[arg(long)]
    url: Option<String>,
    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List uploaded binaries
    Jars,
    /// Upload a .jar, .egg or .whl file
    Upload {
        /// Name to upload the binary under
        name: String,
        file: PathBuf,
    },
    /// Delete an uploaded binary
    DeleteBinary {
        name: String,
    },
    /// List contexts
    Contexts,
    /// Create a context
    CreateContext {
        name: String,
        /// Context parameter, e.g. num-cpu-cores=2
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Delete a context
    DeleteContext {
        name: String,
    },
    /// Restart all contexts from the server configuration
    ResetContexts,
    /// List jobs
    Jobs,
    /// Submit a job
    Submit {
        /// Binary the job class lives in
        #[arg(short, long)]
        app: String,
        /// Fully qualified job class
        #[arg(short = 'C', long)]
        class: String,
        /// Context to run in
        #[arg(long)]
        context: Option<String>,
        /// Block on the server until the job finishes
        #[arg(long)]
        sync: bool,
        /// Job input
        #[arg(short, long, conflicts_with = "data_file")]
        data: Option<String>,
        /// File holding the job input
        #[arg(long)]
        data_file: Option<PathBuf>,
        /// Extra parameter, e.g. timeout=60
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Poll until the job reaches a final state
        #[arg(short, long)]
        wait: bool,
        /// Seconds between polls
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
    /// Get job status and result
    Status {
        id: String,
    },
    /// Poll a job until it reaches a final state
    Wait {
        id: String,
        /// Seconds between polls
        #[arg(long, default_value_t = 1)]
        interval: u64,
    },
    /// Get the configuration a job ran with
    Config {
        id: String,
    },
    /// Kill a running job
    Kill {
        id: String,
    },
    /// List uploaded data files
    Data,
    /// Upload a data file
    UploadData {
        prefix: String,
        file: PathBuf,
    },
    /// Delete an uploaded data file
    DeleteData {
        filename: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    setup_logging(&config, cli.verbose)?;

    let url = cli.url
        .or_else(|| std::env::var("JOBSERVER_URL").ok())
        .unwrap_or_else(|| config.server.url.clone());
    let registry = ClientRegistry::new(config.transport.clone());
    let client = registry.client(&url)?;
    log::debug!("Using job server {}", client.base_url());

    match cli.command {
        Commands::Jars => {
            let mut table = Table::new();
            table.set_header(vec!["Name", "Type", "Uploaded"]);
            for jar in client.get_jars()? {
                table.add_row(vec![
                    jar.name.clone(),
                    jar.binary_type.clone().unwrap_or_else(|| "-".to_string()),
                    jar.uploaded_at.to_rfc3339(),
                ]);
            }
            println!("{table}");
        },
        Commands::Upload { name, file } => {
            report(client.upload_binary_file(&file, &name)?, "Upload")?;
        },
        Commands::DeleteBinary { name } => {
            report(client.delete_binary(&name)?, "Delete binary")?;
        },
        Commands::Contexts => {
            for context in client.get_contexts()? {
                println!("{}", context);
            }
        },
        Commands::CreateContext { name, params } => {
            let params = parse_params(&params)?;
            report(client.create_context(&name, &params)?, "Create context")?;
        },
        Commands::DeleteContext { name } => {
            report(client.delete_context(&name)?, "Delete context")?;
        },
        Commands::ResetContexts => {
            report(client.reset_contexts()?, "Reset contexts")?;
        },
        Commands::Jobs => {
            let mut table = Table::new();
            table.set_header(vec!["Job ID", "Status", "Context", "Class", "Started", "Duration"]);
            for job in client.get_jobs()? {
                table.add_row(vec![
                    job.job_id().map(|id| id.to_string()).unwrap_or_default(),
                    job.status().map(|s| s.to_string()).unwrap_or_default(),
                    job.context().unwrap_or("").to_string(),
                    job.class_path().unwrap_or("").to_string(),
                    job.start_time().unwrap_or("").to_string(),
                    job.duration().unwrap_or("").to_string(),
                ]);
            }
            println!("{table}");
        },
        Commands::Submit { app, class, context, sync, data, data_file, params, wait, interval } => {
            let mut conf = SubmitConf::new().app_name(app).class_path(class).sync(sync);
            if let Some(context) = context {
                conf = conf.context(context);
            }
            let mut all_params = conf.to_params();
            all_params.extend(parse_params(&params)?);

            let job = match data_file {
                Some(path) => client.submit_job_file(&path, &all_params)?,
                None => client.submit_job(data.as_deref(), &all_params)?,
            };
            let job = if wait {
                wait_for(&client, job, Duration::from_secs(interval))?
            } else {
                job
            };
            print_job(&job);
        },
        Commands::Status { id } => {
            print_job(&client.get_job_result(&id)?);
        },
        Commands::Wait { id, interval } => {
            let job = client.get_job_result(&id)?;
            print_job(&wait_for(&client, job, Duration::from_secs(interval))?);
        },
        Commands::Config { id } => {
            let config = client.get_config(&id)?;
            println!("{}", serde_json::to_string_pretty(config.configs())?);
        },
        Commands::Kill { id } => {
            report(client.kill_job(&id)?, "Kill job")?;
        },
        Commands::Data => {
            for file in client.get_data_files()? {
                println!("{}", file);
            }
        },
        Commands::UploadData { prefix, file } => {
            let reader = std::fs::File::open(&file)
                .with_context(|| format!("Failed to open data file: {:?}", file))?;
            let stored = client.upload_data(reader, &prefix)?;
            println!("{}", stored.filename);
        },
        Commands::DeleteData { filename } => {
            report(client.delete_data(&filename)?, "Delete data file")?;
        },
    }

    Ok(())
}

fn report(ok: bool, what: &str) -> Result<()> {
    if ok {
        println!("Success");
        Ok(())
    } else {
        bail!("{} rejected by job server", what)
    }
}

fn parse_params(raw: &[String]) -> Result<Params> {
    raw.iter()
        .map(|p| parse_param(p).ok_or_else(|| anyhow!("Invalid parameter {:?}, expected key=value", p)))
        .collect()
}

/// Re-fetches the job until it leaves STARTED/RUNNING.
fn wait_for(client: &JobServerClient, mut job: JobInfo, interval: Duration) -> Result<JobInfo> {
    while job.is_running() {
        let id = job.job_id()
            .map(|id| id.0.clone())
            .ok_or_else(|| anyhow!("Job server returned a running job without id"))?;
        std::thread::sleep(interval);
        job = client.get_job_result(&id)?;
        log::debug!("Job {} is {:?}", id, job.status());
    }
    Ok(job)
}

fn print_job(job: &JobInfo) {
    if job.is_not_found() || job.job_not_exists() {
        println!("Job not found.");
        return;
    }
    println!("Job Details:");
    println!("  ID:       {}", job.job_id().map(|id| id.to_string()).unwrap_or_default());
    println!("  Status:   {}", job.status().map(|s| s.to_string()).unwrap_or_default());
    println!("  Context:  {}", job.context().unwrap_or(""));
    println!("  Class:    {}", job.class_path().unwrap_or(""));
    println!("  Started:  {}", job.start_time().unwrap_or(""));
    println!("  Duration: {}", job.duration().unwrap_or(""));
    match job.result_as_error() {
        Ok(Some(error)) => {
            println!("  Error:    {} ({})", error.message, error.error_class.as_deref().unwrap_or("-"));
            for frame in &error.stack {
                println!("            {}", frame);
            }
        },
        _ => {
            if let Some(result) = job.result_as_string() {
                println!("  Result:   {}", result);
            }
        },
    }
}

fn load_config(explicit: Option<&Path>) -> Result<ClientConfig> {
    if let Some(path) = explicit {
        return ClientConfig::from_file(path);
    }

    let mut config = ClientConfig::default();
    let system = PathBuf::from(common::DEFAULT_CONFIG_PATH);
    if system.exists() {
        config.merge(ConfigLayer::from_file(&system)?);
    }
    if let Ok(home) = std::env::var("HOME") {
        let user = Path::new(&home).join(common::USER_CONFIG_PATH);
        if user.exists() {
            config.merge(ConfigLayer::from_file(&user)?);
        }
    }
    Ok(config)
}

fn setup_logging(config: &ClientConfig, verbose: u8) -> Result<()> {
    let level = match verbose {
        0 => log::LevelFilter::from_str(&config.logging.level)
            .with_context(|| format!("Invalid log level: {}", config.logging.level))?,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}] {}",
                chrono::Local::now().format("%Y-%m-%d][%H:%M:%S"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr());

    if let Some(path) = &config.logging.output {
        dispatch = dispatch.chain(fern::log_file(path)?);
    }

    dispatch.apply()?;
    Ok(())
}
