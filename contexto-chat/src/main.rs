use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use contexto_core::config::ModelConfig;
use contexto_core::dataset::load_dataset;
use contexto_core::model::{ContextModel, DEFAULT_CONTEXT};
use log::{LevelFilter, debug};

/// Console chatbot over a context-aware n-gram model.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
	/// Model order (maximum window length)
	#[arg(long, default_value_t = 3)]
	order: usize,

	/// Comma separated contexts; the first one is active at start
	#[arg(long, value_delimiter = ',', default_value = "casual,formal")]
	contexts: Vec<String>,

	/// Number of past inputs used as working context
	#[arg(long, default_value_t = 5)]
	history: usize,

	/// JSON configuration file, overrides order/contexts/history
	#[arg(long)]
	config: Option<PathBuf>,

	/// JSON dataset of { context, input, response } entries
	#[arg(long)]
	dataset: Option<PathBuf>,

	/// Previously saved model to start from
	#[arg(long)]
	model: Option<PathBuf>,

	/// Print replies token by token
	#[arg(long)]
	stream: bool,

	/// Delay between streamed tokens, in milliseconds
	#[arg(long, default_value_t = 100)]
	delay_ms: u64,

	/// Maximum number of tokens per reply
	#[arg(long, default_value_t = 30)]
	max_length: usize,
}

/// Built-in exchanges used when no dataset is given.
const DEFAULT_TRAINING: &[(&str, &str, &str)] = &[
	("casual", "Hi", "Hey there! How's it going?"),
	("casual", "Hey", "Hi! What's up?"),
	("casual", "How are you", "I'm doing great, thanks for asking! How about you?"),
	("casual", "What's up", "Not much, just chatting! What's new with you?"),
	("casual", "Bye", "See you later! Take care!"),
	("casual", "What time is it", "Let me check the time for you."),
	("casual", "Tell me a joke", "Why don't scientists trust atoms? Because they make up everything!"),
	("casual", "How's the weather", "I'm not sure, but I hope it's nice where you are!"),
	("formal", "Hello", "Good day. How may I assist you?"),
	("formal", "How are you", "I'm well, thank you for asking. How may I be of service?"),
	("formal", "Goodbye", "Thank you for your time. Have a pleasant day."),
	("formal", "Can you help me", "Of course, I'd be glad to assist you. What do you need help with?"),
	("formal", "Thank you", "You're welcome. Is there anything else I can help you with?"),
	("formal", "What is the current time", "Certainly, I'd be happy to provide you with the current time."),
];

fn current_time() -> String {
	chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Keeps the part of a reply after the `=>` separator.
fn extract_reply(response: &str) -> &str {
	match response.split_once("=>") {
		Some((_, reply)) => reply.trim(),
		None => response,
	}
}

fn build_model(args: &Args) -> Result<ContextModel, Box<dyn std::error::Error>> {
	let config = match &args.config {
		Some(path) => ModelConfig::from_json_file(path)?,
		None => ModelConfig::new(args.order, args.contexts.iter().cloned()).with_history_size(args.history),
	};
	let mut model = ContextModel::with_config(config)?;

	if let Some(path) = &args.model {
		model.load(path)?;
	}

	match &args.dataset {
		Some(path) => model.train_dataset(&load_dataset(path)?),
		None => {
			for (context, input, response) in DEFAULT_TRAINING {
				model.train(&format!("{input} => {response}"), context);
			}
		}
	}

	model.register_function("gettime", |_: &str| current_time(), "Get current time");
	Ok(model)
}

/// Prints streamed snapshots as they grow and returns the final response.
fn stream_response(model: &mut ContextModel, args: &Args, context: &str, seed: &str) -> Result<String, Box<dyn std::error::Error>> {
	let mut stdout = io::stdout();
	print!("Chatbot: ");

	let mut shown = String::new();
	let mut response = String::new();
	for item in model.generate_response_stream(context, seed, args.max_length) {
		response = item?;
		let reply = extract_reply(&response);
		match reply.strip_prefix(shown.as_str()) {
			Some(rest) => print!("{rest}"),
			// Filtered or dispatched final reply
			None => print!("\nChatbot: {reply}"),
		}
		shown = reply.to_owned();
		stdout.flush()?;
		thread::sleep(Duration::from_millis(args.delay_ms));
	}
	Ok(response)
}

/// Generates and prints one reply.
fn respond(model: &mut ContextModel, args: &Args, context: &str, input: &str) -> Result<(), Box<dyn std::error::Error>> {
	let seed = format!("{input} =>");
	let response = if args.stream {
		stream_response(model, args, context, &seed)?
	} else {
		let response = model.generate_response(context, &seed, args.max_length)?;
		print!("Chatbot: {}", extract_reply(&response));
		response
	};
	debug!("Generated response: \"{response}\"");

	if input.to_lowercase().contains("time") && !response.contains("[Function Call: gettime]") {
		print!(" [Function Call: gettime] Result: {}", current_time());
	}
	println!();
	Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
	// The logger accepts debug records; "debug on/off" moves the global max level
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
	log::set_max_level(LevelFilter::Info);
	let args = Args::parse();
	let mut model = build_model(&args)?;

	let mut context = model.contexts().first().cloned().unwrap_or_else(|| DEFAULT_CONTEXT.to_owned());
	println!("Chatbot is ready! Type \"exit\" to end the conversation.");
	println!("Type \"debug on\" to enable debug mode or \"debug off\" to disable it.");

	let stdin = io::stdin();
	loop {
		print!("You: ");
		io::stdout().flush()?;

		let mut line = String::new();
		if stdin.lock().read_line(&mut line)? == 0 {
			break;
		}
		let input = line.trim();
		let lowered = input.to_lowercase();

		match lowered.as_str() {
			"exit" => break,
			"debug on" => {
				log::set_max_level(LevelFilter::Debug);
				println!("Debug mode enabled.");
				continue;
			}
			"debug off" => {
				log::set_max_level(LevelFilter::Info);
				println!("Debug mode disabled.");
				continue;
			}
			"" => continue,
			_ => (),
		}

		if let Some(switch) = model.contexts().iter().find(|c| lowered.contains(c.as_str())) {
			if *switch != context {
				context = switch.clone();
				println!("Chatbot: Switching to {context} context.");
			}
		}

		respond(&mut model, &args, &context, input)?;
	}

	Ok(())
}
