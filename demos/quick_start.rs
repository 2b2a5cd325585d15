use std::sync::Arc;

use rentacar_client::models::{Color, Rental};
use rentacar_client::{
    EditSession, EntityClient, EntityResolver, HttpTransport, InMemoryBackend, QueryParams,
    Resolution, Transport,
};

/// Walks the basic client workflow. Point RENTACAR_API_URL at a running
/// backend to go over HTTP; otherwise everything runs against the
/// in-memory backend.
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let transport: Arc<dyn Transport> = match std::env::var("RENTACAR_API_URL") {
        Ok(url) => Arc::new(HttpTransport::new(&url)?),
        Err(_) => Arc::new(InMemoryBackend::new()),
    };

    let colors: EntityClient<Color> = EntityClient::new(transport.clone());
    let rentals: EntityClient<Rental> = EntityClient::new(transport.clone());

    let red = colors.create(&Color {
        color_name: Some("red".to_string()),
        ..Default::default()
    })?;
    println!("created {:?}", red);

    let page = colors.query(&QueryParams::default().page(0).size(20).sort("id,asc"))?;
    println!("{} colors total", page.total_count.unwrap_or(0));

    // Resolve the edit route for the record we just created, tweak it, save.
    let resolver = EntityResolver::new(colors.clone());
    match resolver.resolve(red.id)? {
        Resolution::Entity(color) => {
            let mut session = EditSession::new(color);
            session.draft_mut().color_name = Some("crimson".to_string());
            let navigation = session.save(&colors)?;
            println!("saved {:?}, navigating {:?}", session.draft(), navigation);
        }
        Resolution::Redirect(route) => println!("redirecting to {}", route),
    }

    // A rental with dates, round-tripped through the wire format.
    let rental = rentals.create(&Rental {
        rent_date: Some(chrono::Utc::now()),
        ..Default::default()
    })?;
    println!("rented: {:?}", rental);

    Ok(())
}
