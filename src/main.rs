use anyhow::Context;
use cane_harvest::{
    chatbot::{self, ChatbotClient, Language, SHOWCASE_QUESTIONS},
    output::OutputWriter,
    HarvestError, Harvester, HarvesterConfig,
};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Harvest sugarcane farming knowledge and smoke-test the advisory chatbot", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Crawl the configured agricultural sources and write the knowledge base files
    Harvest(HarvestArgs),

    /// Check the chatbot's /health endpoint
    Health(ServerArgs),

    /// Send a question to the chatbot's /ask endpoint
    Ask(AskArgs),

    /// Send an image to the chatbot's /scan-image endpoint
    ScanImage(ScanImageArgs),

    /// Classify an image as sugarcane or weed via /classify-plant
    ClassifyPlant(ClassifyPlantArgs),

    /// Ask the infographic showcase questions and check that infographics are served
    Showcase(ServerArgs),
}

#[derive(Args, Debug)]
struct HarvestArgs {
    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,

    /// Configuration file layered over the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the knowledge base files are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// How many link hops to follow from each seed
    #[arg(long)]
    max_depth: Option<u32>,

    /// Pause between requests, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,
}

#[derive(Args, Debug)]
struct ServerArgs {
    /// Chatbot server host
    #[arg(long, env = "SERVER_HOST", default_value = "localhost")]
    host: String,

    /// Chatbot server port [env: PORT, SERVER_PORT] [default: 5000]
    #[arg(long)]
    port: Option<u16>,
}

impl ServerArgs {
    fn port(&self) -> u16 {
        self.port
            .or_else(|| env_port("PORT"))
            .or_else(|| env_port("SERVER_PORT"))
            .unwrap_or(5000)
    }

    fn client(&self) -> cane_harvest::Result<ChatbotClient> {
        ChatbotClient::new(&self.host, self.port())
    }
}

fn env_port(name: &str) -> Option<u16> {
    std::env::var(name).ok()?.trim().parse().ok()
}

#[derive(Args, Debug)]
struct AskArgs {
    #[command(flatten)]
    server: ServerArgs,

    /// The question to ask
    #[arg(default_value = "What are the best practices for sugarcane pest control?")]
    question: String,

    /// Response language
    #[arg(long, value_enum, default_value_t = Language::English)]
    language: Language,
}

#[derive(Args, Debug)]
struct ScanImageArgs {
    #[command(flatten)]
    server: ServerArgs,

    /// Path to the image to scan
    #[arg(long, env = "TEST_IMAGE")]
    image: PathBuf,

    /// Response language
    #[arg(long, value_enum, default_value_t = Language::English)]
    language: Language,

    /// Prompt guiding the analysis
    #[arg(
        long,
        default_value = "Is this showing red rot? Suggest immediate treatment."
    )]
    prompt: String,
}

#[derive(Args, Debug)]
struct ClassifyPlantArgs {
    #[command(flatten)]
    server: ServerArgs,

    /// Path to the image to classify
    #[arg(long, env = "TEST_IMAGE")]
    image: PathBuf,

    /// Response language
    #[arg(long, value_enum, default_value_t = Language::English)]
    language: Language,
}

/// The main entry point of the application.
///
/// Crawl failures never fail `harvest`; only configuration and output errors do. The smoke-test
/// commands exit with 1 on an unsuccessful response, 2 when the server is unreachable, and 3 on
/// any other error.
#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Harvest(args) => harvest(args).await.map(|()| true),
        Commands::Health(args) => health(&args).await,
        Commands::Ask(args) => ask(&args).await,
        Commands::ScanImage(args) => scan_image(&args).await,
        Commands::ClassifyPlant(args) => classify_plant(&args).await,
        Commands::Showcase(args) => showcase(&args).await,
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            match e.downcast_ref::<HarvestError>() {
                Some(HarvestError::RequestError(e)) if e.is_connect() => {
                    eprintln!("Connection error. Is the chatbot server running?")
                }
                Some(HarvestError::RequestError(e)) if e.is_timeout() => {
                    eprintln!("Request timed out.")
                }
                _ => {}
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// 2 when the server could not be reached, 3 for any other failure.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<HarvestError>() {
        Some(HarvestError::RequestError(e)) if e.is_connect() => 2,
        _ => 3,
    }
}

async fn harvest(args: HarvestArgs) -> anyhow::Result<()> {
    let mut config =
        HarvesterConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(output_dir) = args.output_dir {
        config.output_dir = output_dir;
    }
    if let Some(max_depth) = args.max_depth {
        config.max_depth = max_depth;
    }
    if let Some(delay_ms) = args.delay_ms {
        config.request_delay_ms = delay_ms;
    }

    print_banner();
    if !args.yes && !confirm("Proceed with scraping? (yes/no): ")? {
        println!("Scraping cancelled.");
        return Ok(());
    }
    warn!("robots.txt is not consulted; make sure the configured sources allow scraping");

    let writer = OutputWriter::new(&config.output_dir, Local::now());
    let mut harvester = Harvester::new(config).context("creating harvester")?;
    let records = harvester.run().await;

    writer
        .write_all(records)
        .await
        .with_context(|| format!("writing output to {}", writer.output_dir().display()))?;

    let total_words: usize = records.iter().map(|r| r.word_count).sum();
    println!("\n=== Harvest Summary ===");
    println!("Data saved to: {}", writer.output_dir().display());
    println!("Total articles: {}", records.len());
    println!("Total words: {}", total_words);
    println!("\nNext steps:");
    println!("  1. Review the harvested content in {}", writer.output_dir().display());
    println!("  2. Upload the files to the chatbot using the /upload endpoint");
    println!("  3. Test the chatbot with sugarcane-related questions");

    Ok(())
}

fn print_banner() {
    println!("=== Sugarcane Farming Knowledge Harvester ===");
    println!("\nThis will collect information about:");
    println!("  - Sugarcane cultivation practices");
    println!("  - Pest and disease management");
    println!("  - Fertilizer and irrigation schedules");
    println!("  - Variety information");
    println!("  - Harvesting and post-harvest practices");
    println!("  - Government schemes and advisories");
    println!("\nNote: please respect robots.txt and the terms of service of each source\n");
}

fn confirm(prompt: &str) -> io::Result<bool> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;

    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

async fn health(args: &ServerArgs) -> anyhow::Result<bool> {
    let client = args.client()?;
    println!("Testing {} ...", client.endpoint("/health")?);

    let response = client.health().await?;
    println!("Status: {}", response.status);
    println!("{}", response.pretty());

    Ok(response.status.is_success())
}

async fn ask(args: &AskArgs) -> anyhow::Result<bool> {
    let client = args.server.client()?;
    println!("Sending request to: {}", client.endpoint("/ask")?);
    println!("Question: {} ({})", args.question, args.language);
    println!("{}", "-".repeat(50));

    let response = client
        .ask(&args.question, args.language, chatbot::ASK_TIMEOUT)
        .await?;
    println!("Status: {}", response.status);
    println!("{}", response.pretty());

    let missing = response.missing_fields(&["response"]);
    if !missing.is_empty() {
        println!("Missing fields: {}", missing.join(", "));
    }

    Ok(response.status.is_success() && missing.is_empty())
}

async fn scan_image(args: &ScanImageArgs) -> anyhow::Result<bool> {
    if !args.image.is_file() {
        println!(
            "Image file '{}' not found. Provide a valid path with --image or set TEST_IMAGE.",
            args.image.display()
        );
        return Ok(false);
    }

    let client = args.server.client()?;
    println!(
        "Sending image {} to {} ...",
        args.image.display(),
        client.endpoint("/scan-image")?
    );

    let response = client
        .scan_image(&args.image, args.language, &args.prompt)
        .await?;
    println!("Status: {}", response.status);
    match response.json() {
        Some(_) => println!("Response JSON:"),
        None => println!("Raw Response:"),
    }
    println!("{}", response.pretty());

    Ok(response.status.is_success())
}

async fn classify_plant(args: &ClassifyPlantArgs) -> anyhow::Result<bool> {
    if !args.image.exists() {
        println!("Error: image file not found: {}", args.image.display());
        return Ok(false);
    }

    let client = args.server.client()?;
    println!("Testing plant classification");
    println!("URL:      {}", client.endpoint("/classify-plant")?);
    println!("Image:    {}", args.image.display());
    println!("Language: {}", args.language);
    println!("{}", "-".repeat(60));

    let response = client.classify_plant(&args.image, args.language).await?;
    println!("Response Status: {}", response.status);

    match response.json() {
        Some(result) if response.status.is_success() => {
            println!("{}", chatbot::render_classification(result));
            Ok(true)
        }
        _ => {
            println!(
                "Error: {}",
                response.str_field("error").unwrap_or("Unknown error")
            );
            Ok(false)
        }
    }
}

async fn showcase(args: &ServerArgs) -> anyhow::Result<bool> {
    let client = args.client()?;

    println!("Testing /health endpoint...");
    let health = client.health().await?;
    if !health.status.is_success() {
        println!("Health check failed: {}", health.pretty());
        return Ok(false);
    }
    println!("Health check passed: {}", health.pretty());

    let mut generated = Vec::with_capacity(SHOWCASE_QUESTIONS.len());
    for (i, (question, description)) in SHOWCASE_QUESTIONS.iter().enumerate() {
        println!("\n{}", "=".repeat(70));
        println!("TEST {}: {}", i + 1, description);
        println!("{}", "=".repeat(70));

        let ok = match showcase_question(&client, question).await {
            Ok(ok) => ok,
            Err(e) => {
                println!("Error: {}", e);
                false
            }
        };
        generated.push((*description, ok));

        if i + 1 < SHOWCASE_QUESTIONS.len() {
            println!("\nWaiting 3 seconds before next test...");
            tokio::time::sleep(Duration::from_secs(3)).await;
        }
    }

    let successful = generated.iter().filter(|(_, ok)| *ok).count();
    println!("\n=== Test Summary ===");
    println!("Total tests: {}", generated.len());
    println!("Infographics generated: {}", successful);
    println!(
        "Success rate: {:.1}%\n",
        successful as f64 / generated.len() as f64 * 100.0
    );
    for (i, (description, ok)) in generated.iter().enumerate() {
        let status = if *ok { "Generated" } else { "Not generated" };
        println!("Test {}: {} - {}", i + 1, status, description);
    }

    Ok(successful > 0)
}

async fn showcase_question(client: &ChatbotClient, question: &str) -> anyhow::Result<bool> {
    let response = client
        .ask(question, Language::English, chatbot::SHOWCASE_ASK_TIMEOUT)
        .await?;
    println!("Status Code: {}", response.status);

    if !response.status.is_success() {
        println!("Error: {}", response.pretty());
        return Ok(false);
    }

    let answer_len = response.str_field("response").map_or(0, str::len);
    println!("Response received ({} chars)", answer_len);

    let Some(infographic_url) = response.str_field("infographic_url") else {
        println!("No infographic generated");
        return Ok(false);
    };
    println!("Infographic URL: {}", infographic_url);
    println!(
        "Reason: {}",
        response.str_field("infographic_reason").unwrap_or("N/A")
    );

    let reachable = client.is_reachable(infographic_url).await?;
    if reachable {
        println!("Infographic accessible");
    } else {
        println!("Infographic not accessible");
    }

    Ok(reachable)
}
