use crate::infra::{
    seed_banks, seed_invitations, seed_surveys, InMemoryCatalog, InMemoryResponseRepository,
};
use clap::Args;
use std::collections::BTreeMap;
use std::sync::Arc;
use survey_engine::error::AppError;
use survey_engine::surveys::{
    AnswerKey, AnswerSheet, InMemoryInvitationGate, PageRequest, RawAnswer, StatisticsFilter,
    SubmissionError, SubmissionRequest, SurveyService,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Survey slug to run the walkthrough against.
    #[arg(long, default_value = "capitals-quiz")]
    pub(crate) survey: String,
    /// Route the first submission through the seeded invitation gate.
    #[arg(long)]
    pub(crate) with_invitation: bool,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        survey,
        with_invitation,
    } = args;

    println!("Survey scoring demo");

    let banks = seed_banks();
    let catalog = Arc::new(InMemoryCatalog::with(seed_surveys(), banks.clone()));
    let responses = Arc::new(InMemoryResponseRepository::default());
    let gate = Arc::new(InMemoryInvitationGate::with_invitations(seed_invitations()));
    let service = Arc::new(SurveyService::new(catalog, responses, gate));

    // Correct option text per seeded question id, so the demo can play both
    // a perfect and a failing respondent against a freshly sampled set.
    let mut correct_texts: BTreeMap<String, String> = BTreeMap::new();
    let mut wrong_texts: BTreeMap<String, String> = BTreeMap::new();
    for bank in &banks {
        for question in &bank.questions {
            if let Some(AnswerKey::SingleChoice(index)) = &question.answer_key {
                if let Some(option) = question.options.get(*index) {
                    correct_texts.insert(question.id.0.clone(), option.text.clone());
                }
                if let Some(option) = question
                    .options
                    .iter()
                    .enumerate()
                    .find(|(i, _)| i != index)
                    .map(|(_, option)| option)
                {
                    wrong_texts.insert(question.id.0.clone(), option.text.clone());
                }
            }
        }
    }

    let questions = match service.questions(&survey) {
        Ok(questions) => questions,
        Err(err) => {
            println!("  Question resolution failed: {err}");
            return Ok(());
        }
    };

    if let Some(seeded) = seed_surveys().iter().find(|s| s.matches_key(&survey)) {
        println!("\n{} ({})", seeded.title, seeded.kind.label());
    }
    println!("Served question set for '{survey}'");
    for question in &questions {
        let options: Vec<&str> = question
            .options
            .iter()
            .map(|option| option.text.as_str())
            .collect();
        println!(
            "- [{}] {} ({}, {} pts) options: {}",
            question.id.0,
            question.text,
            question.kind.label(),
            question.points,
            options.join(" | ")
        );
    }

    // Every served question gets an entry; a text the demo map does not
    // know stays unanswered.
    let pick = |texts: &BTreeMap<String, String>| -> AnswerSheet {
        AnswerSheet::Keyed(
            questions
                .iter()
                .map(|question| {
                    let answer = texts
                        .get(&question.id.0)
                        .map(|text| RawAnswer::Text(text.clone()));
                    (question.id.0.clone(), answer)
                })
                .collect(),
        )
    };

    let invitation_code = with_invitation.then(|| "demo-invite".to_string());
    submit_and_report(
        &service,
        &survey,
        SubmissionRequest {
            name: "Ada Perfect".to_string(),
            email: "ada@example.com".to_string(),
            answers: pick(&correct_texts),
            time_spent: 95,
            is_auto_submit: false,
            invitation_code,
            answer_durations: BTreeMap::new(),
        },
    );
    submit_and_report(
        &service,
        &survey,
        SubmissionRequest {
            name: "Bob Hasty".to_string(),
            email: "bob@example.com".to_string(),
            answers: pick(&wrong_texts),
            time_spent: 31,
            is_auto_submit: true,
            invitation_code: None,
            answer_durations: BTreeMap::new(),
        },
    );

    match service.statistics(&survey, &StatisticsFilter::default(), &PageRequest::default()) {
        Ok(statistics) => {
            println!("\nAggregated statistics");
            println!(
                "- {} responses | completion rate {:.1}% | {} questions",
                statistics.summary.total_responses,
                statistics.summary.completion_rate,
                statistics.summary.total_questions
            );
            for stats in &statistics.aggregated_stats {
                println!("- {}", stats.question);
                for (option, count) in &stats.options {
                    println!("    {option}: {count}");
                }
            }
            println!("Response listing");
            for view in &statistics.user_responses {
                let outcome = view
                    .score
                    .as_ref()
                    .map(|score| {
                        format!(
                            "score {} ({})",
                            score.display_score,
                            if score.passed { "passed" } else { "failed" }
                        )
                    })
                    .unwrap_or_else(|| "unscored".to_string());
                println!(
                    "- {} <{}> {} in {}s{}",
                    view.name,
                    view.email,
                    outcome,
                    view.time_spent,
                    if view.is_auto_submit {
                        " [auto-submitted]"
                    } else {
                        ""
                    }
                );
            }
        }
        Err(err) => println!("  Statistics unavailable: {err}"),
    }

    Ok(())
}

fn submit_and_report<C, R, G>(
    service: &SurveyService<C, R, G>,
    survey: &str,
    request: SubmissionRequest,
) where
    C: survey_engine::surveys::SurveyStore + survey_engine::surveys::QuestionBankStore + 'static,
    R: survey_engine::surveys::ResponseRepository + 'static,
    G: survey_engine::surveys::InvitationGate + 'static,
{
    let name = request.name.clone();
    match service.submit(survey, request) {
        Ok(response) => {
            println!("\nSubmission from {name} -> {}", response.id.0);
            match &response.score {
                Some(score) => println!(
                    "  {}/{} points | display score {} | {} correct, {} wrong | {}",
                    score.total_points,
                    score.max_possible_points,
                    score.display_score,
                    score.correct_answers,
                    score.wrong_answers,
                    if score.passed { "PASSED" } else { "FAILED" }
                ),
                None => println!("  Plain survey, no scoring performed"),
            }
            for snapshot in &response.question_snapshots {
                println!(
                    "  Q{} '{}' -> {} ({} of {} pts)",
                    snapshot.question_index + 1,
                    snapshot.question_data.text,
                    if snapshot.scoring.is_correct {
                        "correct"
                    } else {
                        "incorrect"
                    },
                    snapshot.scoring.points_awarded,
                    snapshot.scoring.max_points
                );
            }
        }
        Err(SubmissionError::Authorization(rejection)) => {
            println!("\nSubmission from {name} rejected by invitation gate: {rejection}");
        }
        Err(err) => println!("\nSubmission from {name} failed: {err}"),
    }
}
