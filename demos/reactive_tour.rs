//! A tour of the single and multi-value publishers.
//!
//! Run with `RUST_LOG=info` to see the output of the `log` stages.

use std::time::Duration;

use fluxweld::prelude::*;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn just_then_error() {
    println!("=== just / then ===");

    let error_mono = error::<String>(Error::custom("Error from mono"));
    let m1 = just("Learn Code".to_string()).log("m1").then(error_mono.clone());

    m1.subscribe(
        |data| println!("Data: {data}"),
        |err| println!("Handled error from m1: {err}"),
        || {},
    );
    error_mono.subscribe(
        |data| println!("Data: {data}"),
        |err| println!("Handled error: {err}"),
        || {},
    );
}

fn zip_monos() {
    println!("=== zip ===");

    let m1 = just("Mono m1");
    let m2 = just("Mono m2");
    let m3 = just("Mono m3");

    zip3(m1.clone(), m2.clone(), m3).subscribe_next(|(first, _, _)| println!("{first}"));
    m1.zip_with(m2).subscribe_next(|(first, second)| {
        println!("{first}");
        println!("{second}");
    });
}

fn map_and_flat_map() {
    println!("=== map / flat_map ===");

    let m1 = just("Mono m1");
    m1.clone()
        .map(|data| data.to_uppercase())
        .subscribe_next(|data| println!("{data}"));

    m1.clone()
        .flat_map(|data| just(data.split(' ').map(str::to_string).collect::<Vec<_>>()))
        .subscribe_next(|words| {
            for word in words {
                println!("{word}");
            }
        });

    println!("---------------------------------------");
    m1.flat_map_many(|data| from_iter(data.split(' ').collect::<Vec<_>>()))
        .subscribe_next(|word| println!("{word}"));
}

async fn delayed_concat() -> Result<()> {
    println!("=== concat_with / delay_elements ===");
    println!("{:?}", std::thread::current().id());

    let sink = CollectSubscriber::new();
    just("Mono m1")
        .concat_with(just("Mono m2"))
        .log("concat")
        .delay_elements(Duration::from_millis(300))
        .do_on_next(|data| {
            println!("{:?}", std::thread::current().id());
            println!("{data}");
        })
        .subscribe_with(sink.clone());

    sink.wait_terminal().await;
    match sink.error() {
        Some(e) => Err(e),
        None => {
            println!("Main ends");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fluxweld=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    just_then_error();
    zip_monos();
    map_and_flat_map();
    delayed_concat().await
}
