use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use actix_web::{get, put, web, App, HttpResponse, HttpServer, Responder};

use contexto_core::config::ModelConfig;
use contexto_core::io::list_files;
use contexto_core::model::{ContextModel, DEFAULT_MAX_LENGTH};
use log::{error, info};
use serde::Deserialize;

/// Query parameters for the `/v1/generate` endpoint
#[derive(Deserialize)]
struct GenerateParams {
	context: Option<String>,
	input: Option<String>,
	max_length: Option<usize>
}

/// Query parameters for the `/v1/predict` endpoint
#[derive(Deserialize)]
struct PredictParams {
	context: Option<String>,
	phrase: Option<String>
}

/// Query parameters for the `/v1/train` endpoint
#[derive(Deserialize)]
struct TrainParams {
	context: Option<String>,
	text: Option<String>
}

#[derive(Deserialize)]
struct ModelQuery {
	name: Option<String>
}

#[derive(Deserialize)]
struct LoadQuery {
	names: Option<String>
}

struct SharedData {
	model: ContextModel,
	data_dir: PathBuf
}

impl SharedData {
	/// Path of the snapshot called `name` in the data directory.
	fn model_path(&self, name: &str) -> PathBuf {
		self.data_dir.join(format!("{name}.json"))
	}
}

/// Returns the trimmed value of a required query parameter.
fn required<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, HttpResponse> {
	match value {
		Some(s) if !s.trim().is_empty() => Ok(s.trim()),
		_ => Err(HttpResponse::BadRequest().body(format!("Missing or empty '{name}'")))
	}
}

/// Registers the functions this server exposes to generation.
///
/// Needed again after every load: callables are not persisted.
fn register_functions(model: &mut ContextModel) {
	model.register_function("gettime", |_: &str| chrono::Local::now().format("%H:%M:%S").to_string(), "Get current time");
}

/// HTTP GET endpoint `/v1/generate`
///
/// Generates a response to `input` in `context` and returns it as the body.
#[get("/v1/generate")]
async fn get_generated(data: web::Data<Mutex<SharedData>>, query: web::Query<GenerateParams>) -> impl Responder {
	let context = match required(&query.context, "context") {
		Ok(s) => s,
		Err(e) => return e
	};
	let input = match required(&query.input, "input") {
		Ok(s) => s,
		Err(e) => return e
	};
	let max_length = query.max_length.unwrap_or(DEFAULT_MAX_LENGTH);

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match shared_data.model.generate_response(context, input, max_length) {
		Ok(result) => HttpResponse::Ok().body(result),
		Err(e) => {
			error!("Generation failed: {e}");
			HttpResponse::InternalServerError().body(e.to_string())
		}
	}
}

/// HTTP GET endpoint `/v1/predict`
///
/// Returns the next token, or 204 when the model has no prediction.
#[get("/v1/predict")]
async fn get_predicted(data: web::Data<Mutex<SharedData>>, query: web::Query<PredictParams>) -> impl Responder {
	let context = match required(&query.context, "context") {
		Ok(s) => s,
		Err(e) => return e
	};
	let phrase = match required(&query.phrase, "phrase") {
		Ok(s) => s,
		Err(e) => return e
	};

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match shared_data.model.predict(context, phrase, &HashSet::new()) {
		Some(token) => HttpResponse::Ok().body(token),
		None => HttpResponse::NoContent().finish()
	}
}

#[put("/v1/train")]
async fn put_train(data: web::Data<Mutex<SharedData>>, query: web::Query<TrainParams>) -> impl Responder {
	let context = match required(&query.context, "context") {
		Ok(s) => s,
		Err(e) => return e
	};
	let text = match required(&query.text, "text") {
		Ok(s) => s,
		Err(e) => return e
	};

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	shared_data.model.train(text, context);
	HttpResponse::Ok().body("Trained")
}

#[get("/v1/contexts")]
async fn get_contexts(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	HttpResponse::Ok().body(shared_data.model.contexts().join("\n"))
}

#[get("/v1/models")]
async fn get_models(data: web::Data<Mutex<SharedData>>) -> impl Responder {
	let data_dir = match data.lock() {
		Ok(m) => m.data_dir.clone(),
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};
	match list_files(&data_dir, "json") {
		Ok(files) => HttpResponse::Ok().body(files.join("\n").replace(".json", "")),
		Err(_) => HttpResponse::InternalServerError().body("Failed to list models")
	}
}

/// HTTP PUT endpoint `/v1/load_models`
///
/// `names` is a comma separated list of snapshots: the first one replaces
/// the model, the following ones are merged into it.
#[put("/v1/load_models")]
async fn put_load_models(data: web::Data<Mutex<SharedData>>, query: web::Query<LoadQuery>) -> impl Responder {
	let query_names = match required(&query.names, "names") {
		Ok(s) => s,
		Err(e) => return e
	};

	let model_names: Vec<&str> = query_names
		.split(',')
		.map(|s| s.trim())
		.filter(|s| !s.is_empty())
		.collect();

	let mut shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	for (index, name) in model_names.iter().enumerate() {
		let model_path = shared_data.model_path(name);
		let outcome = if index == 0 {
			shared_data.model.load(&model_path)
		} else {
			shared_data.model.merge_file(&model_path)
		};
		if let Err(e) = outcome {
			return HttpResponse::InternalServerError().body(format!("Failed to load model {name}: {e}"));
		}
	}
	register_functions(&mut shared_data.model);

	HttpResponse::Ok().body("Models loaded successfully")
}

#[put("/v1/save_model")]
async fn put_save_model(data: web::Data<Mutex<SharedData>>, query: web::Query<ModelQuery>) -> impl Responder {
	let name = match required(&query.name, "name") {
		Ok(s) => s,
		Err(e) => return e
	};

	let shared_data = match data.lock() {
		Ok(m) => m,
		Err(_) => return HttpResponse::InternalServerError().body("Model lock failed"),
	};

	match shared_data.model.save(shared_data.model_path(name)) {
		Ok(_) => HttpResponse::Ok().body("Model saved successfully"),
		Err(e) => HttpResponse::InternalServerError().body(format!("Failed to save model: {e}"))
	}
}

/// Main entry point for the server.
///
/// Builds a `casual`/`formal` model, wraps it in a `Mutex` (the model
/// itself is not synchronised) and starts an Actix-web HTTP server.
///
/// # Notes
/// - The server binds to 127.0.0.1:5000.
/// - Snapshots live in `CONTEXTO_DATA_DIR` (default `./data`).
/// - All clients share one conversation history.
#[actix_web::main]
async fn main() -> std::io::Result<()> {
	env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

	let data_dir = PathBuf::from(std::env::var("CONTEXTO_DATA_DIR").unwrap_or_else(|_| "./data".to_owned()));
	let mut model = ContextModel::with_config(ModelConfig::new(3, ["casual", "formal"]))
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
	register_functions(&mut model);

	let shared_model = web::Data::new(Mutex::new(SharedData { model, data_dir }));
	info!("Listening on 127.0.0.1:5000");

	HttpServer::new(move || {
		App::new()
			.app_data(shared_model.clone())
			.service(get_generated)
			.service(get_predicted)
			.service(put_train)
			.service(get_contexts)
			.service(get_models)
			.service(put_load_models)
			.service(put_save_model)
	})
		.bind(("127.0.0.1", 5000))?
		.run()
		.await
}
