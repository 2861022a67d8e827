use std::env;

use futures::StreamExt;
use model::{trip::TripEvent, ExampleData};
use simulator::SimulatorConfig;
use tracking::{
    fleet::FleetConfig,
    reference::StaticReferenceData,
    tracker::{Tracker, TrackingRequest},
};

#[tokio::main]
async fn main() {
    env_logger::init();

    // reference data
    let reference = match env::var("BUS_DATASET") {
        Ok(path) => StaticReferenceData::from_file(&path).expect("could not load dataset."),
        Err(_) => StaticReferenceData::example_data(),
    };
    let tracker = Tracker::new(reference, SimulatorConfig::from_env())
        .with_fleet(FleetConfig::from_env())
        .await
        .expect("could not start fleet simulation.");

    let mut args = env::args().skip(1);
    let start = args.next().unwrap_or_else(|| "Kharar Bus Stand".to_owned());
    let destination = args
        .next()
        .unwrap_or_else(|| "Ludhiana Bus Stand".to_owned());

    // search
    let buses = match tracker.search(&start, &destination).await {
        Ok(buses) => buses,
        Err(why) => {
            log::error!("search failed: {}", why);
            return;
        }
    };
    for found in &buses {
        let bus = &found.content;
        log::info!(
            "bus {} ({}): {:.1} km away, {:?} crowd, {} passengers",
            bus.bus.id,
            bus.route_name,
            found.distance_km,
            bus.crowd,
            bus.bus.content.passenger_count
        );
    }
    let Some(bus) = buses.first().map(|found| &found.content.bus) else {
        log::warn!("no buses from {} to {}", start, destination);
        return;
    };

    // track the closest bus, confirming every prompt right away
    let request = TrackingRequest {
        bus_id: bus.id.clone(),
        origin_stop: start,
        destination_stop: destination,
        initial_position: Some(bus.content.position),
        initial_path_index: Some(bus.content.current_path_index),
    };
    let handle = match tracker.track(request).await {
        Ok(handle) => handle,
        Err(why) => {
            log::error!("could not start tracking: {}", why);
            return;
        }
    };
    let mut updates = Box::pin(handle.updates());
    while let Some(update) = updates.next().await {
        match serde_json::to_string(&update) {
            Ok(json) => println!("{}", json),
            Err(why) => log::error!("could not serialize update: {}", why),
        }
        let result = match update.event {
            Some(TripEvent::ArrivedAtRider) => handle.confirm_boarding().await,
            Some(TripEvent::ArrivedAtDestination) => handle.confirm_alight().await,
            _ => continue,
        };
        if let Err(why) = result {
            log::error!("{}", why);
        }
    }

    tracker.shutdown();
}
