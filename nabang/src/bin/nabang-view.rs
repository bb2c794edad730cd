use std::path::PathBuf;
use std::process::exit;
use std::thread;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use nabang::{post_verdict, Event, LogReader, ReadResult, Verdict};

fn main() {
    let ViewCommand {
        file,
        once,
        poll,
        answer,
    } = ViewCommand::parse();

    let idle = Duration::from_millis(poll);
    let mut reader = LogReader::open(&file);

    loop {
        let outcome = reader.read_once(|func_id, payload| render(func_id, payload, answer));

        match outcome {
            ReadResult::Delivered => {}
            ReadResult::Pending => {
                if once {
                    break;
                }
                thread::sleep(idle);
            }
            ReadResult::WriterExited => {
                eprintln!("log closed by the writer");
                break;
            }
            ReadResult::NotFound => {
                if once {
                    eprintln!("no log at {}", file.display());
                    exit(2);
                }
                // The writer may not have started yet; a reader handle
                // never recovers on its own, so probe with a fresh one.
                thread::sleep(idle);
                reader = LogReader::open(&file);
            }
        }
    }
}

fn render(func_id: u16, payload: &[u8], answer: Option<Answer>) {
    match Event::parse(func_id, payload) {
        Ok(event) => {
            println!("{event}");

            if let (Event::Valid { key, .. }, Some(answer)) = (&event, answer) {
                if let Err(err) = post_verdict(*key, answer.into()) {
                    eprintln!("failed to answer validation {key}: {err}");
                }
            }
        }
        Err(err) => eprintln!("skipping undecodable unit: {err}"),
    }
}

#[derive(Parser)]
struct ViewCommand {
    /// The backing log file to follow.
    #[arg(default_value = "nabang.blog")]
    file: PathBuf,

    /// Drain the backlog and exit instead of following the writer.
    #[arg(long)]
    once: bool,

    /// Poll interval while idle, in milliseconds.
    #[arg(long, default_value_t = 20)]
    poll: u64,

    /// Answer failed validations automatically, with this verdict. Without
    /// it the writer stays parked until someone else answers.
    #[arg(value_enum, long)]
    answer: Option<Answer>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Answer {
    /// Tear the writer process down.
    Abort,
    /// Let the writer continue with the condition still false.
    Continue,
    /// Flip the failed condition to true and continue.
    Ignore,
}

impl From<Answer> for Verdict {
    fn from(answer: Answer) -> Verdict {
        match answer {
            Answer::Abort => Verdict::Abort,
            Answer::Continue => Verdict::Continue,
            Answer::Ignore => Verdict::Ignore,
        }
    }
}
