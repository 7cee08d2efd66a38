use itertools::Itertools;
use quiz_algorithms::knowledge::reachability_matrix;
use quiz_algorithms::{
    AlgorithmConfig, AlgorithmOutput, AnswerOutcome, Difficulty, Family, Question, QuizAlgorithms,
    SessionState, Topic, explain,
};

fn setup_logging() -> Result<(), log::SetLoggerError> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .level(log::LevelFilter::Debug)
        .chain(std::io::stderr())
        .apply()
}

fn question(id: usize, topic: Topic, difficulty: Difficulty, correct_answer: usize) -> Question {
    Question {
        id: format!("q{id}"),
        topic,
        difficulty,
        title: format!("Question {id}"),
        description: String::new(),
        options: ["A".into(), "B".into(), "C".into(), "D".into()],
        correct_answer,
        explanation: String::new(),
        created_by: "demo".into(),
        created_at: String::new(),
    }
}

fn question_pool() -> Vec<Question> {
    vec![
        question(1, Topic::Arrays, Difficulty::Easy, 0),
        question(2, Topic::Arrays, Difficulty::Medium, 2),
        question(3, Topic::Arrays, Difficulty::Hard, 1),
        question(4, Topic::LinkedLists, Difficulty::Easy, 3),
        question(5, Topic::LinkedLists, Difficulty::Medium, 0),
        question(6, Topic::LinkedLists, Difficulty::Hard, 2),
        question(7, Topic::LinkedLists, Difficulty::Medium, 1),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    setup_logging()?;

    let config = AlgorithmConfig::deterministic(7);
    let epsilon = config.q_learning.epsilon;
    let mut engine = QuizAlgorithms::new(config.clone())?;

    let pool = question_pool();
    let test_len = 5;
    let mut session = SessionState::new(pool.len(), test_len);

    // Scripted learner answers, one per question slot.
    let answers = [0, 1, 1, 3, 0];
    let mut asked = Vec::new();

    for (slot, answer) in answers.into_iter().enumerate() {
        let selection = engine.q_learning(&session.q_table, 0, epsilon)?;
        let AlgorithmOutput::QLearning(choice) = &selection.result else {
            unreachable!("q_learning always yields a Q-learning payload");
        };
        let action = choice.selected_action;
        let correct = pool[action].is_correct(answer);
        asked.push((action, correct));
        println!("{}", explain::question_selection(&selection.result, action));

        session.record_answer(
            AnswerOutcome {
                question_index: slot,
                action: Some(action),
                correct,
            },
            &config.q_learning,
        )?;

        let (features, weights) = session.dkt_history.features();
        let dkt = engine.dkt(&features, &weights)?;
        println!("{}", explain::knowledge_tracing(&dkt.result, correct));

        let bkt = engine.bkt(0.5, 0.1, 0.2, 0.1, correct)?;
        println!("{}", explain::knowledge_tracing(&bkt.result, correct));
    }

    let outcomes = asked.iter().map(|&(_, correct)| correct).collect_vec();
    let rewards = outcomes
        .iter()
        .map(|&c| if c { 1.0 } else { 0.0 })
        .collect_vec();

    let schedule = engine.min_heap(&session.priorities)?;
    println!("{}", explain::review_scheduler(&schedule.result));

    let weights = asked
        .iter()
        .map(|&(action, _)| pool[action].difficulty.weight())
        .collect_vec();
    let knapsack = engine.knapsack(&weights, &rewards, 8)?;
    println!("{}", explain::question_selection(&knapsack.result, 0));

    let fenwick = engine.fenwick_tree(&rewards, 0, rewards.len() as f64 - 1.0)?;
    println!("{}", explain::reward_system(&fenwick.result, outcomes[0]));

    let ratio = engine.variable_ratio(outcomes.len(), &[2, 3, 4, 5])?;
    println!("{}", explain::reward_system(&ratio.result, outcomes[0]));

    let dp = engine.dp(reachability_matrix(&outcomes))?;
    println!(
        "{}",
        explain::explain_by_name(Family::KnowledgeTracing, "DP", &dp.result, 0, true)
    );

    println!("{}", serde_json::to_string_pretty(&schedule)?);
    Ok(())
}
