use std::io::{self, BufRead, Write};

use crate::content::Question;
use crate::session::TestSession;

/// How an interactive run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Finish {
    Completed,
    Quit,
    EndOfInput,
}

/// Walk the remaining questions of `session`, reading 1-based option numbers
/// from `reader`. Invalid input re-prompts the same question; `q` stops early.
pub fn take_test<R: BufRead, W: Write>(
    session: &mut TestSession<'_>,
    mut reader: R,
    mut writer: W,
) -> io::Result<Finish> {
    let pending: Vec<&Question> = session.remaining().collect();
    let total = session.questions().len();
    let already_answered = total - pending.len();
    let mut line = String::new();

    for (offset, question) in pending.into_iter().enumerate() {
        print_question(&mut writer, question, already_answered + offset + 1, total)?;

        loop {
            write!(writer, "> ")?;
            writer.flush()?;

            line.clear();
            if reader.read_line(&mut line)? == 0 {
                writeln!(writer)?;
                return Ok(Finish::EndOfInput);
            }

            let input = line.trim();
            if input.eq_ignore_ascii_case("q") {
                return Ok(Finish::Quit);
            }

            match parse_choice(input, question.options.len()) {
                Some(option) => {
                    if let Err(e) = session.answer(&question.id, option) {
                        tracing::warn!(error = %e, "answer rejected");
                        writeln!(writer, "{}", e)?;
                        continue;
                    }
                    break;
                }
                None => {
                    writeln!(
                        writer,
                        "Please enter a number between 1 and {} (or q to quit).",
                        question.options.len()
                    )?;
                }
            }
        }
    }

    Ok(Finish::Completed)
}

fn print_question<W: Write>(
    writer: &mut W,
    question: &Question,
    position: usize,
    total: usize,
) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(writer, "[{}/{}] {}", position, total, question.prompt)?;
    for (i, option) in question.options.iter().enumerate() {
        writeln!(writer, "  {}) {}", i + 1, option.text)?;
    }
    Ok(())
}

pub fn parse_choice(input: &str, option_count: usize) -> Option<usize> {
    choice_index(input.trim().parse().ok()?, option_count)
}

// 1-based option number to 0-based index
pub fn choice_index(number: usize, option_count: usize) -> Option<usize> {
    if number == 0 || number > option_count {
        return None;
    }
    Some(number - 1)
}
