mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    context, context_over, context_with, settings, FixedJudge, FixedStats, ScriptedGenerator,
    StallingStore,
};

use policyqa_backend::core::config::settings::MISSING_API_KEY_MESSAGE;
use policyqa_backend::evaluation::{MetricKind, Status};
use policyqa_backend::guardrail::{TriggeringRule, Verdict};
use policyqa_backend::pipeline::predict::EMPTY_QUESTION_MESSAGE;
use policyqa_backend::pipeline::{predict, predict_with_ground_truth, run_query};

const SPEED_QUESTION: &str = "What is the internet speed requirement for remote work?";

#[tokio::test]
async fn grounded_answer_is_released() {
    let ctx = context(
        "The policy asks for a minimum of 50 Mbps.",
        0.95,
        0.0,
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    let decision = outcome.decision.expect("guardrail ran");
    assert_eq!(decision.verdict, Verdict::Release);
    assert_eq!(decision.triggering_rule, None);
    assert_eq!(outcome.final_answer, "The policy asks for a minimum of 50 Mbps.");
    assert!(outcome
        .report
        .rows()
        .iter()
        .any(|row| row.metric == "Faithfulness" && row.status == Status::Pass));
}

#[tokio::test]
async fn reasoning_is_stripped_before_release() {
    let ctx = context(
        "The second passage covers connectivity.\n### Final Answer: At least 50 Mbps.",
        0.9,
        0.1,
    );
    let run = run_query(&ctx, SPEED_QUESTION, None).await.unwrap();

    assert_eq!(run.response.reasoning, "The second passage covers connectivity.");
    assert_eq!(run.final_answer(), "At least 50 Mbps.");
    assert_eq!(run.context.len(), 1);
}

#[tokio::test]
async fn ungrounded_poem_is_blocked_on_faithfulness() {
    let ctx = context(
        "Dark roast in the morning, a cup by the screen.",
        0.1,
        0.2,
    );
    let outcome = predict(&ctx, "Write a short poem about office coffee.").await;

    let decision = outcome.decision.expect("guardrail ran");
    assert_eq!(decision.verdict, Verdict::Block);
    assert_eq!(decision.triggering_rule, Some(TriggeringRule::Faithfulness));
    assert!(outcome
        .final_answer
        .starts_with("Response blocked by guardrail: the answer failed the faithfulness"));
}

#[tokio::test]
async fn fenced_json_is_blocked_even_with_good_scores() {
    let ctx = context(
        "```json\n{\"section\": \"remote work\", \"speed\": \"50 Mbps\"}\n```",
        1.0,
        0.0,
    );
    let outcome = predict(&ctx, "Give me the raw JSON of the remote work section.").await;

    let decision = outcome.decision.expect("guardrail ran");
    assert_eq!(decision.triggering_rule, Some(TriggeringRule::Structural));
    assert_eq!(
        outcome.final_answer,
        "Response blocked by guardrail: unauthorized output format (fenced code block)."
    );
}

#[tokio::test]
async fn structural_rule_takes_priority_over_metrics() {
    let ctx = context("{\"speed\": \"50 Mbps\"}", 0.0, 1.0);
    let outcome = predict(&ctx, SPEED_QUESTION).await;
    assert_eq!(
        outcome.decision.unwrap().triggering_rule,
        Some(TriggeringRule::Structural)
    );

    let ctx = context("The policy says 50 Mbps.", 0.2, 0.9);
    let outcome = predict(&ctx, SPEED_QUESTION).await;
    assert_eq!(
        outcome.decision.unwrap().triggering_rule,
        Some(TriggeringRule::Faithfulness)
    );
}

#[tokio::test]
async fn high_contradiction_blocks_with_judge_reason() {
    let ctx = context("Remote staff need 10 Mbps.", 0.8, 0.9);
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    let decision = outcome.decision.expect("guardrail ran");
    assert_eq!(decision.triggering_rule, Some(TriggeringRule::Hallucination));
    assert!(decision.reason.contains("contradiction rate 0.9"));
}

#[tokio::test]
async fn faithfulness_threshold_is_inclusive() {
    for (faithfulness, expected) in [
        (0.39, Verdict::Block),
        (0.40, Verdict::Release),
        (0.41, Verdict::Release),
    ] {
        let ctx = context("Minimum 50 Mbps.", faithfulness, 0.0);
        let outcome = predict(&ctx, SPEED_QUESTION).await;
        assert_eq!(
            outcome.decision.unwrap().verdict,
            expected,
            "faithfulness {}",
            faithfulness
        );
    }
}

#[tokio::test]
async fn hallucination_threshold_is_inclusive() {
    for (hallucination, expected) in [
        (0.49, Verdict::Release),
        (0.50, Verdict::Release),
        (0.51, Verdict::Block),
    ] {
        let ctx = context("Minimum 50 Mbps.", 0.9, hallucination);
        let outcome = predict(&ctx, SPEED_QUESTION).await;
        assert_eq!(
            outcome.decision.unwrap().verdict,
            expected,
            "hallucination {}",
            hallucination
        );
    }
}

#[tokio::test]
async fn failing_backend_defaults_its_metrics_and_blocks() {
    let ctx = context_with(
        settings(),
        ScriptedGenerator::reply("Minimum 50 Mbps."),
        FixedStats::failing("judge quota exhausted"),
        FixedJudge::scoring(0.0),
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    let report = &outcome.report;
    assert_eq!(report.failures().len(), 1);
    assert_eq!(report.failures()[0].engine, "stats");
    assert!(report.failures()[0].message.contains("judge quota exhausted"));
    assert_eq!(report.value(MetricKind::Faithfulness), Some(0.0));
    assert!(report
        .rows()
        .iter()
        .filter(|row| row.engine == "stats")
        .all(|row| row.status == Status::Error));

    let decision = outcome.decision.expect("guardrail still runs");
    assert_eq!(decision.verdict, Verdict::Block);
    assert_eq!(decision.triggering_rule, Some(TriggeringRule::Faithfulness));
}

#[tokio::test]
async fn placeholder_ground_truth_marks_correctness_not_applicable() {
    let ctx = context("Minimum 50 Mbps.", 0.9, 0.0);

    let without = predict(&ctx, SPEED_QUESTION).await;
    let row = without
        .report
        .rows()
        .iter()
        .find(|row| row.metric == "Answer Correctness")
        .expect("correctness row");
    assert_eq!(row.status, Status::NotApplicable);

    let with = predict_with_ground_truth(
        &ctx,
        SPEED_QUESTION,
        Some("The internet speed requirement for remote work is a minimum of 50 Mbps."),
    )
    .await;
    assert!(with.report.ground_truth_supplied());
    let row = with
        .report
        .rows()
        .iter()
        .find(|row| row.metric == "Answer Correctness")
        .expect("correctness row");
    assert_eq!(row.status, Status::Pass);
}

#[tokio::test]
async fn repeated_queries_give_identical_outcomes() {
    let ctx = context("Minimum 50 Mbps.", 0.7, 0.3);
    let first = predict(&ctx, SPEED_QUESTION).await;
    let second = predict(&ctx, SPEED_QUESTION).await;
    assert_eq!(first, second);
}

#[tokio::test]
async fn missing_api_key_is_reported_without_calling_out() {
    let mut no_key = settings();
    no_key.llm.api_key = None;
    let ctx = context_with(
        no_key,
        ScriptedGenerator::reply("unused"),
        FixedStats::all(1.0, 1.0),
        FixedJudge::scoring(0.0),
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    assert_eq!(outcome.final_answer, MISSING_API_KEY_MESSAGE);
    assert!(outcome.report.is_empty());
    assert!(outcome.decision.is_none());
}

#[tokio::test]
async fn generation_failure_becomes_an_error_message() {
    let ctx = context_with(
        settings(),
        ScriptedGenerator::Fail("connection reset".to_string()),
        FixedStats::all(1.0, 1.0),
        FixedJudge::scoring(0.0),
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    assert!(outcome.final_answer.starts_with("Error during processing:"));
    assert!(outcome.final_answer.contains("connection reset"));
    assert!(outcome.report.is_empty());
    assert!(outcome.decision.is_none());
}

#[tokio::test]
async fn generator_panic_is_contained() {
    let ctx = context_with(
        settings(),
        ScriptedGenerator::Panic,
        FixedStats::all(1.0, 1.0),
        FixedJudge::scoring(0.0),
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    assert!(outcome.final_answer.starts_with("Error during processing:"));
    assert!(outcome.report.is_empty());
    assert!(outcome.decision.is_none());
}

#[tokio::test(start_paused = true)]
async fn stalled_generation_times_out() {
    let mut settings = settings();
    settings.llm.timeout = Duration::from_secs(60);
    let ctx = context_with(
        settings,
        ScriptedGenerator::Stall,
        FixedStats::all(1.0, 1.0),
        FixedJudge::scoring(0.0),
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    assert_eq!(
        outcome.final_answer,
        "Error during processing: generation timed out after 60000 ms"
    );
    assert!(outcome.report.is_empty());
    assert!(outcome.decision.is_none());
}

#[tokio::test(start_paused = true)]
async fn stalled_retrieval_times_out() {
    let mut settings = settings();
    settings.retrieval.timeout = Duration::from_secs(5);
    let ctx = context_over(
        Arc::new(StallingStore),
        settings,
        ScriptedGenerator::reply("unused"),
        FixedStats::all(1.0, 1.0),
        FixedJudge::scoring(0.0),
    );

    let err = run_query(&ctx, SPEED_QUESTION, None).await.unwrap_err();
    assert_eq!(err.to_string(), "retrieval timed out after 5000 ms");

    let outcome = predict(&ctx, SPEED_QUESTION).await;
    assert!(outcome.final_answer.contains("timed out"));
    assert!(outcome.decision.is_none());
}

#[tokio::test]
async fn bracketed_citations_are_not_raw_json() {
    let ctx = context(
        "[1] Remote employees need at least 50 Mbps, as stated in passage [1]",
        0.95,
        0.0,
    );
    let outcome = predict(&ctx, SPEED_QUESTION).await;

    let decision = outcome.decision.expect("guardrail ran");
    assert_eq!(decision.verdict, Verdict::Release);
    assert_eq!(decision.triggering_rule, None);
    assert!(outcome.final_answer.contains("50 Mbps"));
}

#[tokio::test]
async fn blank_question_is_rejected_politely() {
    let ctx = context("unused", 1.0, 0.0);
    let outcome = predict(&ctx, "   ").await;
    assert_eq!(outcome.final_answer, EMPTY_QUESTION_MESSAGE);
    assert!(outcome.decision.is_none());
}

mod with_lexical_scores {
    use std::sync::Arc;
    use std::time::Duration;

    use super::common::{settings, FixedJudge, FixedStore, ScriptedGenerator, SPEED_PASSAGE};
    use super::SPEED_QUESTION;
    use policyqa_backend::evaluation::{
        LexicalMetrics, MetricBackend, MetricEngine, MetricKind, StatusTable,
    };
    use policyqa_backend::guardrail::{TriggeringRule, Verdict};
    use policyqa_backend::pipeline::{predict, run_query, PipelineContext};

    fn context(reply: &str) -> PipelineContext {
        let metrics = MetricEngine::new(
            vec![
                MetricBackend::Statistical(Arc::new(LexicalMetrics::new())),
                MetricBackend::ModelGraded(Arc::new(FixedJudge::scoring(0.0))),
            ],
            Duration::from_secs(5),
            StatusTable::default(),
        )
        .unwrap();
        PipelineContext::new(
            Arc::new(FixedStore::new(&[SPEED_PASSAGE])),
            Arc::new(ScriptedGenerator::reply(reply)),
            metrics,
            settings(),
        )
    }

    #[tokio::test]
    async fn answer_quoting_the_policy_is_grounded() {
        let ctx = context(SPEED_PASSAGE);
        let run = run_query(&ctx, SPEED_QUESTION, None).await.unwrap();

        assert!(run.final_answer().to_lowercase().contains("50 mbps"));
        assert!(run.report.value(MetricKind::Faithfulness).unwrap() >= 0.8);
        assert_eq!(run.decision.verdict, Verdict::Release);
    }

    #[tokio::test]
    async fn poem_has_no_support_in_the_policy() {
        let ctx = context("Dark roast swirling, steam above the cup, the office wakes.");
        let outcome = predict(&ctx, "Write a short poem about office coffee.").await;

        let decision = outcome.decision.unwrap();
        assert_eq!(decision.verdict, Verdict::Block);
        assert_eq!(decision.triggering_rule, Some(TriggeringRule::Faithfulness));
    }
}
