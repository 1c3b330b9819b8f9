use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::time::Instant;

use gauge_core::prelude::{
    CancellationToken, Category, Entry, EvaluationResult, Evaluator, EvaluatorDefinition,
    EvaluatorEnv, EvaluatorError, OrchestrationError,
};
use gauge_eval::prelude::*;
use gauge_evaluators::prelude::EvaluatorRegistry;

static FIXED_LATENCY: EvaluatorDefinition = EvaluatorDefinition {
    id: "test/fixed_latency",
    name: "Fixed Latency",
    description: "Waits a fixed time per entry",
    category: Category::Other,
    env_vars: &[],
    required_fields: &[],
    is_guardrail: false,
    docs_url: None,
};

static CREDENTIALED: EvaluatorDefinition = EvaluatorDefinition {
    id: "test/credentialed",
    name: "Credentialed",
    description: "Needs a key that is never set",
    category: Category::Safety,
    env_vars: &["GAUGE_TEST_NEVER_SET_KEY"],
    required_fields: &[],
    is_guardrail: true,
    docs_url: None,
};

struct FixedLatency {
    latency: Duration,
    calls: Arc<AtomicUsize>,
    env: EvaluatorEnv,
}

#[async_trait]
impl Evaluator for FixedLatency {
    fn definition(&self) -> &EvaluatorDefinition {
        &FIXED_LATENCY
    }

    fn settings_json(&self) -> Value {
        Value::Null
    }

    fn env(&self) -> &EvaluatorEnv {
        &self.env
    }

    async fn evaluate(&self, _entry: &Entry) -> Result<EvaluationResult, EvaluatorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        Ok(EvaluationResult::processed().with_passed(true))
    }
}

struct Credentialed {
    env: EvaluatorEnv,
}

#[async_trait]
impl Evaluator for Credentialed {
    fn definition(&self) -> &EvaluatorDefinition {
        &CREDENTIALED
    }

    fn settings_json(&self) -> Value {
        Value::Null
    }

    fn env(&self) -> &EvaluatorEnv {
        &self.env
    }

    async fn evaluate(&self, _entry: &Entry) -> Result<EvaluationResult, EvaluatorError> {
        let key = self.env.require("GAUGE_TEST_NEVER_SET_KEY")?;
        Ok(EvaluationResult::processed().with_details(Some(key.to_string())))
    }
}

fn entries(n: usize) -> Vec<Entry> {
    (0..n)
        .map(|i| Entry::new().with_input(format!("question {i}")))
        .collect()
}

/// 3 evaluators × 100 entries, two evaluators at a time and ten entries at a
/// time: wall clock lands between 10 and 20 latencies, far from the serial 300.
#[tokio::test(start_paused = true)]
async fn nested_ceilings_bound_wall_clock() {
    let latency = Duration::from_millis(100);
    let calls = Arc::new(AtomicUsize::new(0));
    let evaluators: Vec<Arc<dyn Evaluator>> = (0..3)
        .map(|_| {
            Arc::new(FixedLatency {
                latency,
                calls: Arc::clone(&calls),
                env: EvaluatorEnv::empty(),
            }) as Arc<dyn Evaluator>
        })
        .collect();

    let start = Instant::now();
    let set = Orchestrator::new(evaluators)
        .with_max_evaluators_in_parallel(2)
        .with_max_evaluations_in_parallel(10)
        .run(entries(100), CancellationToken::new())
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert_eq!(calls.load(Ordering::SeqCst), 300);
    assert!(elapsed >= latency * 10, "finished too fast: {elapsed:?}");
    assert!(elapsed <= latency * 20 + Duration::from_millis(50), "too slow: {elapsed:?}");
    assert!(set.results().iter().flatten().all(|r| r.passed() == Some(true)));
}

/// An evaluator without credentials errors every entry identically while its
/// sibling still produces complete results.
#[tokio::test]
async fn unavailable_evaluator_does_not_affect_siblings() {
    let registry = EvaluatorRegistry::with_builtins();
    let blocklist = registry
        .create("langevals/competitor_blocklist", &json!({"competitors": ["OpenAI"]}))
        .unwrap();
    let credentialed: Arc<dyn Evaluator> = Arc::new(Credentialed {
        env: EvaluatorEnv::from_map(CREDENTIALED.env_vars, &Default::default()),
    });

    let set = Orchestrator::new(vec![credentialed, blocklist])
        .run(
            vec![
                Entry::new().with_input("mentions OpenAI"),
                Entry::new().with_input("all clear"),
            ],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    let unavailable = &set.results()[0];
    assert_eq!(unavailable[0], unavailable[1]);
    assert!(matches!(
        &unavailable[0],
        EvaluationResult::Error { error_type, message }
            if error_type == "MissingEnv" && message.contains("GAUGE_TEST_NEVER_SET_KEY")
    ));

    let blocklist = &set.results()[1];
    assert_eq!(blocklist[0].passed(), Some(false));
    assert_eq!(blocklist[1].passed(), Some(true));

    let table = set.to_table();
    assert_eq!(table.get(0, "Credentialed"), Some(&json!("error")));
    assert_eq!(table.get(0, "Competitor Blocklist"), Some(&json!(false)));
    assert_eq!(
        table.get(0, "Competitor Blocklist_details"),
        Some(&json!("Competitors mentioned: OpenAI"))
    );
}

/// No new evaluator is scheduled after the interrupt, and the call returns
/// long before any in-flight entry would have finished.
#[tokio::test]
async fn interrupt_mid_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let evaluators: Vec<Arc<dyn Evaluator>> = (0..3)
        .map(|_| {
            Arc::new(FixedLatency {
                latency: Duration::from_secs(30),
                calls: Arc::clone(&calls),
                env: EvaluatorEnv::empty(),
            }) as Arc<dyn Evaluator>
        })
        .collect();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let start = std::time::Instant::now();
    let err = Orchestrator::new(evaluators)
        .with_max_evaluators_in_parallel(1)
        .with_max_evaluations_in_parallel(4)
        .run(entries(10), cancel)
        .await
        .unwrap_err();

    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(matches!(err, OrchestrationError::Interrupted { ref partial } if partial.completed() == 0));
    // Only the first evaluator's first wave of entries ever started.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
