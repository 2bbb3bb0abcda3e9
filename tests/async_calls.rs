#![cfg(feature = "async")]

use futures::future::join_all;
use generational_breaker::{BreakerError, CircuitBreaker, Counts, State};
use std::time::Duration;

mod common;

use common::TestError;

#[tokio::test]
async fn test_async_circuit_breaker() {
    let breaker = CircuitBreaker::builder().failure_threshold(2).build();

    // Test successful async calls
    for _ in 0..5 {
        let result = breaker
            .call_async(|| async { Result::<String, TestError>::Ok("success".to_string()) })
            .await;
        assert!(result.is_ok());
    }

    // Make 2 failing calls to trip breaker
    for _ in 0..2 {
        let result = breaker
            .call_async(|| async { Result::<String, TestError>::Err(TestError::new("error")) })
            .await;
        assert!(matches!(result, Err(BreakerError::Operation(_))));
    }

    assert_eq!(breaker.current_state(), State::Open);

    // Calls should be rejected
    let result = breaker
        .call_async(|| async { Result::<String, TestError>::Ok("success".to_string()) })
        .await;
    assert!(matches!(result, Err(BreakerError::Open)));
}

#[tokio::test]
async fn test_cancelled_call_counts_as_failure() {
    let breaker = CircuitBreaker::builder().failure_threshold(1).build();

    let slow = breaker.call_async(|| async {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Result::<(), TestError>::Ok(())
    });
    let timed_out = tokio::time::timeout(Duration::from_millis(10), slow).await;

    assert!(timed_out.is_err());
    assert_eq!(breaker.current_state(), State::Open);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_async_calls() {
    let breaker = CircuitBreaker::builder()
        .generation_interval(Duration::from_secs(3600))
        .build();

    let calls = (0..50).map(|_| {
        let breaker = breaker.clone();
        tokio::spawn(async move {
            breaker
                .call_async(|| async {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    Result::<(), TestError>::Ok(())
                })
                .await
        })
    });

    for result in join_all(calls).await {
        assert!(result.unwrap().is_ok());
    }
    assert_eq!(breaker.current_counts(), Counts::new(50, 50, 0));
}

#[test]
fn test_async_call_without_runtime() {
    let breaker = CircuitBreaker::builder().build();

    let result = tokio_test::block_on(
        breaker.call_async(|| async { Result::<u32, TestError>::Err(TestError::new("down")) }),
    );

    assert_eq!(result, Err(BreakerError::Operation(TestError::new("down"))));
    assert_eq!(breaker.current_counts(), Counts::new(1, 0, 1));
}
