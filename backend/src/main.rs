use actix_cors::Cors;
use actix_web::dev::{Service, ServiceResponse};
use actix_web::{middleware::Logger, web, App, HttpServer};

mod errors;
mod handlers;
mod services;
mod state;

use embedding::{Embedder, VectorStore};
use graph_rag::GraphStore;
use mindgraph_config::AppConfig;
use state::AppState;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    mindgraph_observability::init_tracing_for("mindgraph-backend");
    let config = AppConfig::from_env();

    let metadata = data::MetadataStore::connect(&config.sqlite_path())
        .await
        .expect("Failed to open metadata store");

    tracing::info!("🔷 Connecting to Neo4j at {}...", config.neo4j_uri);
    let graph = GraphStore::connect(&config.neo4j_uri, &config.neo4j_user, &config.neo4j_password)
        .await
        .expect("Failed to connect to Neo4j");

    let vectors = VectorStore::new(&config.qdrant_url).expect("Failed to build Qdrant client");
    let embedder = Embedder::new(&config.embedding_model_ko, &config.embedding_model_en);

    let port = config.port;
    let state = web::Data::new(AppState {
        config,
        metadata,
        graph,
        vectors,
        embedder,
    });

    tracing::info!("🚀 Starting mindgraph-backend on port {port}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .supports_credentials();

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            // Error bodies carry {code, message, path}; the path is only
            // known here, so failed responses are rebuilt at this layer.
            .wrap_fn(|req, srv| {
                let http_req = req.request().clone();
                let fut = srv.call(req);
                async move {
                    match fut.await {
                        Ok(res) => Ok(res.map_into_boxed_body()),
                        Err(err) => {
                            let response = errors::enriched_response(&err, http_req.path());
                            Ok(ServiceResponse::new(http_req, response).map_into_boxed_body())
                        }
                    }
                }
            })
            .configure(handlers::brain_graph::configure)
            .configure(handlers::brains::configure)
            .configure(handlers::sources::configure)
            .configure(handlers::chat_sessions::configure)
            .configure(handlers::models::configure)
            .route(
                "/health",
                web::get().to(|| async {
                    actix_web::HttpResponse::Ok().json(serde_json::json!({
                        "status": "healthy",
                        "service": "mindgraph-backend"
                    }))
                }),
            )
    })
    .bind(("0.0.0.0", port))?
    .run()
    .await
}
