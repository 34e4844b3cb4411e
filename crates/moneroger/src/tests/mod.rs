//! Behaviour suites for the supervisor, coordinator and run sequence.


type StepResult = Result<(), String>;

fn parse_count(text: &str) -> Result<usize, String> {
    text.parse()
        .map_err(|error| format!("'{text}' is not a count: {error}"))
}
