use generational_breaker::{CircuitBreaker, Event};
use std::error::Error;
use std::fmt;
use std::thread;
use std::time::Duration;

#[derive(Debug)]
struct ServiceError(usize);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "manual error times: {}", self.0)
    }
}

impl Error for ServiceError {}

fn on_change(event: &Event) {
    println!(
        "[{:?}] State change from {} to {} due to '{}'",
        event.when, event.from, event.to, event.reason
    );
}

fn run(breaker: &CircuitBreaker, success: bool, times: usize) {
    for i in 1..=times {
        let result = breaker.call(|| {
            if success {
                Ok(())
            } else {
                Err(ServiceError(i))
            }
        });

        print!(
            "[{}] {}, {}",
            i,
            breaker.current_counts(),
            breaker.current_state()
        );
        if let Err(err) = result {
            print!(", error: {}", err);
        }
        println!();
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let breaker = CircuitBreaker::builder()
        .generation_interval(Duration::from_secs(2))
        .open_state_expiry(Duration::from_secs(2))
        .failure_threshold(3)
        .success_threshold(5)
        .half_open_request_limit(10)
        .on_state_change(on_change)
        .build();

    run(&breaker, false, 10);
    println!("Sleep 2s");
    thread::sleep(Duration::from_secs(2));
    run(&breaker, true, 2);
    run(&breaker, false, 1);
    run(&breaker, true, 2);
    println!("Sleep 2s");
    thread::sleep(Duration::from_secs(2));
    run(&breaker, true, 6);
}
