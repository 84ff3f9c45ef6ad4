use std::io::{self, BufRead, Write};

use seqcast_core::{DisplayColor, PredictorError, Session, Strategy};
use tracing::debug;

const PROMPT: &str = "Enter the most recent winning character (A/B/Q): ";

fn paint(color: DisplayColor, text: &str) -> String {
    let code = match color {
        DisplayColor::Green => "32",
        DisplayColor::Blue => "34",
        DisplayColor::Red => "31",
    };
    format!("\x1b[{code}m{text}\x1b[0m")
}

/// Per-strategy accuracy lines, skipping strategies never verified.
pub fn final_statistics(session: &Session) -> Vec<String> {
    let Some(predictor) = session.predictor() else {
        return Vec::new();
    };
    Strategy::ALL
        .iter()
        .filter_map(|&strategy| {
            let stats = predictor.stats(strategy);
            (stats.total > 0)
                .then(|| format!("{strategy}: {:.2}% accuracy", stats.accuracy() * 100.0))
        })
        .collect()
}

/// Read A/B/Q lines until Q or end of input, printing a hint after each symbol.
pub fn run_interactive<R: BufRead, W: Write>(
    session: &mut Session,
    input: R,
    mut out: W,
    color: bool,
) -> io::Result<()> {
    let render = |c: DisplayColor, text: &str| {
        if color {
            paint(c, text)
        } else {
            text.to_string()
        }
    };

    writeln!(out, "Enter 'A' or 'B' for each round, 'Q' to quit")?;
    write!(out, "{PROMPT}")?;
    out.flush()?;

    for line in input.lines() {
        let line = line?;
        match line.trim().to_uppercase().as_str() {
            "Q" => break,
            symbol @ ("A" | "B") => match session.predict(symbol) {
                Ok(response) => {
                    debug!(
                        symbol = %response.symbol,
                        confidence = response.confidence,
                        strategy = %response.strategy,
                        state = %response.state,
                        "prediction"
                    );
                    writeln!(out, "{}", render(response.color, &response.message))?;
                }
                Err(PredictorError::NotTrained) => {
                    writeln!(out, "{}", render(DisplayColor::Red, "Model has not been trained."))?;
                }
                Err(e) => writeln!(out, "{}", render(DisplayColor::Red, &format!("An error occurred: {e}")))?,
            },
            _ => writeln!(
                out,
                "{}",
                render(DisplayColor::Red, "Invalid input. Please enter 'A', 'B', or 'Q'")
            )?,
        }
        write!(out, "{PROMPT}")?;
        out.flush()?;
    }

    writeln!(out)?;
    writeln!(out, "Final Statistics:")?;
    for line in final_statistics(session) {
        writeln!(out, "{line}")?;
    }
    Ok(())
}
