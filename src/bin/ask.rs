use anyhow::Result;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use kb_chat::client::{ChatClient, ConversationContext};
use kb_chat::models::ChatEnvelope;

#[derive(Parser, Debug)]
#[command(name = "ask")]
#[command(about = "Ask the knowledge base chat endpoint a question")]
struct Cli {
    #[arg(
        long,
        env = "KB_CHAT_API_URL",
        default_value = "http://127.0.0.1:8080/api/chat"
    )]
    endpoint: String,
    /// Continue an existing conversation.
    #[arg(long)]
    session: Option<String>,
    /// Question to ask. Starts an interactive conversation when omitted.
    question: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let client = ChatClient::new(cli.endpoint)?;
    let mut conversation = ConversationContext::new(cli.session);

    if let Some(question) = cli.question {
        let envelope = conversation.ask(&client, &question).await?;
        print_answer(&envelope);
        return Ok(());
    }

    println!("Ask a question (empty line to quit).");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match conversation.ask(&client, question).await {
            Ok(envelope) => print_answer(&envelope),
            Err(err) => eprintln!("error: {err:#}"),
        }
    }

    Ok(())
}

fn print_answer(envelope: &ChatEnvelope) {
    println!("\n{}\n", envelope.generated_response);

    if envelope.detailed_references.is_empty() {
        return;
    }

    println!("References ({}):", envelope.source_count);
    for (idx, reference) in envelope.detailed_references.iter().enumerate() {
        println!("  [{}] {}", idx + 1, reference.source.uri);
        if !reference.source.snippet.is_empty() {
            println!("      {}", reference.source.snippet);
        }
        println!("      {}", reference.presigned_url);
    }
    println!(
        "Links expire at {}",
        envelope.url_expiration_time.format("%Y-%m-%d %H:%M UTC")
    );
    if let Some(session_id) = &envelope.session_id {
        println!("Session: {session_id}");
    }
}
