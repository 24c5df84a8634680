use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use shopbot::core::app::App;
use shopbot::core::chat_stream::StreamDispatcher;
use shopbot::core::config::Config;
use shopbot::core::notice::ChannelNotifier;
use shopbot::storage::{ConversationStore, MemoryStore};
use shopbot::ui::chat_loop::{self, ChatLoopChannels};

#[derive(Parser)]
#[command(name = "shopbot")]
#[command(about = "A terminal chat client for a streaming AI shopping assistant")]
#[command(long_about = "Shopbot is a terminal chat interface that talks to a shopping-assistant \
relay and renders its streamed replies in real time.\n\n\
Configuration is read from the platform config directory and can be \
overridden with SHOPBOT_BASE_URL / SHOPBOT_API_KEY or the flags below.\n\n\
Controls:\n\
  Enter              Send the message\n\
  Ctrl+N             Start a new conversation\n\
  Ctrl+Up/Ctrl+Down  Switch conversations\n\
  Up/Down/Mouse      Scroll the transcript\n\
  Ctrl+C             Quit")]
struct Args {
    /// Base URL of the chat relay.
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load()?.resolve(args.base_url);

    let store = Arc::new(MemoryStore::new());
    let store_rx = store.subscribe();
    let (notifier, notice_rx) = ChannelNotifier::new();
    let (dispatcher, stream_rx) = StreamDispatcher::new();

    let mut app = App::new(&config, store.clone(), store.clone(), Arc::new(notifier));
    app.start_new_conversation().await;

    chat_loop::run(
        app,
        ChatLoopChannels {
            dispatcher,
            stream_rx,
            notice_rx,
            store_rx,
        },
    )
    .await
}
