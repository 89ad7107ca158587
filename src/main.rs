use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use mongodb::Client;
use tripsplit::{server, settings::Settings, store::TripStore};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::new()?;

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "tripsplit={level},actix_web={level}",
            level = settings.app.level
        ))
        .init();

    tracing::info!("Using database \"{}\"", settings.mongodb.database);
    let client = Client::with_uri_str(&settings.mongodb.uri).await?;
    let store = TripStore::new(&client, &settings.mongodb.database);
    store.ensure_indexes().await?;
    tracing::info!("Connected");

    let state = web::Data::new(server::AppState {
        store,
        policy: settings.settlement,
    });

    let addr = (settings.server.bind.clone(), settings.server.port);
    tracing::info!("Listening on {}:{}", addr.0, addr.1);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(server::configure)
    })
    .bind(addr)?
    .run()
    .await?;

    Ok(())
}
