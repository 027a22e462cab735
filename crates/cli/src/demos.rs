//! Built-in coffee demos.
//!
//! Each demo is expressed in whole seconds and scaled by `unit`, so a run
//! with `--unit-ms 50` takes a twentieth of the real time.

use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempo_core::{Action, ActionError, Milestone, TaskError, TimedEvent};
use tempo_execution::{Countdown, CountdownBuilder, NamedTask};

/// Ingredients added to the cup so far.
#[derive(Debug, Default)]
pub struct Cup {
    ingredients: Mutex<Vec<&'static str>>,
}

impl Cup {
    pub fn add(&self, ingredient: &'static str) -> Result<(), ActionError> {
        self.ingredients
            .lock()
            .map_err(|_| ActionError::new("cup is broken"))?
            .push(ingredient);
        Ok(())
    }

    pub fn contents(&self) -> Vec<&'static str> {
        self.ingredients
            .lock()
            .map(|i| i.clone())
            .unwrap_or_default()
    }

    fn serve(&self) -> Result<(), ActionError> {
        if self.contents().contains(&"coffee") {
            Ok(())
        } else {
            Err(ActionError::new("nothing to serve, no coffee in the cup"))
        }
    }
}

/// Countdown from `from` adding ingredients along the way. Milestones above
/// `from` are left out.
pub fn coffee_timer(from: u64, unit: Duration) -> (CountdownBuilder, Arc<Cup>) {
    let cup = Arc::new(Cup::default());

    let add = |ingredient: &'static str| {
        let cup = cup.clone();
        Action::new(move || cup.add(ingredient))
    };
    let serve = {
        let cup = cup.clone();
        Action::new(move || cup.serve())
    };

    let milestones = vec![
        Milestone::new(16, "Adding Coffee...!!!", add("coffee")),
        Milestone::new(13, "Adding Sugar...!!!", add("sugar")),
        Milestone::new(11, "Adding Warm Water...!!!", add("warm water")),
        Milestone::new(5, "Stirring...!!!", Action::noop()),
        Milestone::new(0, "☕ Serving Coffee...!!!", serve),
    ];

    let builder = Countdown::builder(from, unit)
        .milestones(milestones.into_iter().filter(|m| m.trigger() <= from));
    (builder, cup)
}

/// Ten preparation steps, two seconds apart.
pub fn coffee_shop(unit: Duration) -> Vec<TimedEvent> {
    const STEPS: [&str; 10] = [
        "✓ Heating water...",
        "✓ Grinding coffee beans...",
        "✓ Preparing cup...",
        "✓ Adding coffee powder...",
        "✓ Pouring hot water...",
        "✓ Adding sugar...",
        "✓ Adding milk...",
        "✓ Stirring...",
        "✓ Final touches...",
        "🎉 Coffee is ready! Enjoy!",
    ];

    STEPS
        .iter()
        .zip(1u32..)
        .map(|(label, n)| TimedEvent::new(*label, unit * (2 * n), Action::noop()))
        .collect()
}

/// Three customers ordering at the same time.
pub fn customer_orders<S>(unit: Duration, say: S) -> Vec<NamedTask>
where
    S: Fn(&str, &str) + Clone + Send + Sync + 'static,
{
    [("Espresso", 3u32), ("Cappuccino", 4), ("Latte", 5)]
        .into_iter()
        .enumerate()
        .map(|(i, (drink, seconds))| {
            let say = say.clone();
            NamedTask::from_fn(format!("Customer {}", i + 1), move |ctx| {
                let say = say.clone();
                async move {
                    say(ctx.label(), &format!("👤 Ordering {}...", drink));
                    ctx.wait(unit * seconds).await?;
                    say(ctx.label(), &format!("☕ {} ready!", drink));
                    Ok::<(), TaskError>(())
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_execution::{ChannelObserver, EventGroup, TaskGroup};

    #[tokio::test(start_paused = true)]
    async fn test_coffee_timer_serves_coffee() {
        let (builder, cup) = coffee_timer(20, Duration::from_millis(10));
        let countdown = builder.build().unwrap();
        assert_eq!(countdown.milestones().len(), 5);

        let report = countdown.start().await.unwrap();
        assert!(report.is_complete());
        assert_eq!(report.ticks.len(), 21);
        assert!(report.failed_milestones().is_empty());
        assert_eq!(cup.contents(), vec!["coffee", "sugar", "warm water"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_timer_has_nothing_to_serve() {
        let (builder, cup) = coffee_timer(3, Duration::from_millis(10));
        let countdown = builder.build().unwrap();
        assert_eq!(countdown.milestones().len(), 1);

        let report = countdown.start().await.unwrap();
        assert!(cup.contents().is_empty());
        let failed = report.failed_milestones();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, "☕ Serving Coffee...!!!");
    }

    #[tokio::test(start_paused = true)]
    async fn test_coffee_shop_fires_in_delay_order() {
        let events = coffee_shop(Duration::from_millis(5));
        assert_eq!(events[0].delay(), Duration::from_millis(10));
        assert_eq!(events[9].delay(), Duration::from_millis(100));

        let (observer, mut rx) = ChannelObserver::new();
        let report = EventGroup::new(events)
            .unwrap()
            .with_observer(Arc::new(observer))
            .run_all()
            .await
            .unwrap();
        assert!(report.is_success());

        let mut fired = Vec::new();
        while let Ok(progress) = rx.try_recv() {
            fired.push(progress.label);
        }
        assert_eq!(fired.first().map(String::as_str), Some("✓ Heating water..."));
        assert_eq!(fired.last().map(String::as_str), Some("🎉 Coffee is ready! Enjoy!"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_customers_are_served_shortest_first() {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let sink = lines.clone();
        let tasks = customer_orders(Duration::from_millis(100), move |who: &str, line: &str| {
            sink.lock().unwrap().push(format!("{}: {}", who, line))
        });

        let report = TaskGroup::new(tasks).unwrap().run_independent().await.unwrap();
        assert!(report.is_success());

        let lines = lines.lock().unwrap();
        let ready: Vec<_> = lines.iter().filter(|l| l.contains("ready")).collect();
        assert_eq!(
            ready,
            vec![
                "Customer 1: ☕ Espresso ready!",
                "Customer 2: ☕ Cappuccino ready!",
                "Customer 3: ☕ Latte ready!"
            ]
        );
    }
}
