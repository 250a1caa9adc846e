//! Load testing for the HTTP surface while every monitor is sampling.

use std::time::Instant;

use fleet_metal::SystemStatus;

mod common;

#[tokio::test]
async fn test_load_performance() {
    let running = common::start(common::test_config()).await;

    let concurrency = 20;
    let requests_per_task = 25;
    let total_requests = concurrency * requests_per_task;

    let client = reqwest::Client::new();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for i in 0..concurrency {
        let client = client.clone();
        // Mix liveness and status traffic.
        let url = if i % 2 == 0 {
            running.url("/health")
        } else {
            running.url("/api/v1/status")
        };
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for _ in 0..requests_per_task {
                let req_start = Instant::now();
                if let Ok(res) = client.get(&url).send().await {
                    if res.status().is_success() {
                        latencies.push(req_start.elapsed());
                    }
                }
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    assert_eq!(all_latencies.len(), total_requests, "some requests failed");
    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    running.stop().await.unwrap();
}

#[tokio::test]
async fn status_is_never_torn_under_concurrent_reads() {
    let running = common::start(common::test_config()).await;
    let client = reqwest::Client::new();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let client = client.clone();
        let url = running.url("/api/v1/status");
        tasks.push(tokio::spawn(async move {
            for _ in 0..20 {
                let status: SystemStatus = client.get(&url).send().await.unwrap().json().await.unwrap();
                let thermal = status.health.thermal;
                // Fan speed and throttling are computed from the same sample.
                if thermal.throttled {
                    assert_eq!(thermal.fan_speed, 100);
                }
                assert!((0..=100).contains(&thermal.fan_speed));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    running.stop().await.unwrap();
}
