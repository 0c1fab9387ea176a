//! Interactive setup for `import --interactive`.

use std::path::PathBuf;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use crate::cli::ImportArgs;
use crate::users::SourcePlatform;

/// Line source for the questions; `None` means the user cancelled.
pub trait Ask {
    fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>>;
}

pub struct Terminal {
    editor: Editor<(), DefaultHistory>,
}

impl Terminal {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            editor: Editor::new()?,
        })
    }
}

impl Ask for Terminal {
    fn ask(&mut self, question: &str) -> anyhow::Result<Option<String>> {
        match self.editor.readline(&format!("{} ", question)) {
            Ok(line) => Ok(Some(line.trim().to_string())),
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Answers collected before a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answers {
    pub args: ImportArgs,
    pub import_to_dev: bool,
}

fn ask_until<A, T>(
    input: &mut A,
    question: &str,
    default: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> anyhow::Result<Option<T>>
where
    A: Ask,
{
    loop {
        let Some(line) = input.ask(question)? else {
            return Ok(None);
        };
        let line = if line.is_empty() { default } else { line.as_str() };
        match parse(line) {
            Some(value) => return Ok(Some(value)),
            None => println!("`{}` is not a valid answer", line),
        }
    }
}

fn yes_no(line: &str) -> Option<bool> {
    match line.to_lowercase().as_str() {
        "y" | "yes" => Some(true),
        "n" | "no" => Some(false),
        _ => None,
    }
}

/// Walk through source, file, target instance, offset and confirmation.
/// `configured_offset` is the offset default when `base` carries none.
/// Returns `None` when the user cancels or declines to start.
pub fn collect<A: Ask>(
    input: &mut A,
    base: &ImportArgs,
    configured_offset: usize,
) -> anyhow::Result<Option<Answers>> {
    let choices = SourcePlatform::ALL
        .iter()
        .map(|s| format!("{} ({})", s.key(), s.label()))
        .collect::<Vec<_>>()
        .join(", ");
    let question = format!("What platform are you migrating your users from? [{}]", choices);
    let Some(source) = ask_until(input, &question, base.source.key(), |l| {
        l.parse::<SourcePlatform>().ok()
    })?
    else {
        return Ok(None);
    };

    let default_file = base.file.display().to_string();
    let question = format!("File to import users from [{}]", default_file);
    let Some(file) = ask_until(input, &question, &default_file, |l| Some(PathBuf::from(l)))? else {
        return Ok(None);
    };

    let Some(import_to_dev) = ask_until(
        input,
        "Import into a production or development instance? \
         Only use development for testing [prod/dev]",
        "prod",
        |l| match l.to_lowercase().as_str() {
            "prod" | "production" => Some(false),
            "dev" | "development" => Some(true),
            _ => None,
        },
    )?
    else {
        return Ok(None);
    };

    let default_offset = base.offset.unwrap_or(configured_offset).to_string();
    let question = format!("Offset to begin importing from [{}]", default_offset);
    let Some(offset) = ask_until(input, &question, &default_offset, |l| {
        l.parse::<usize>().ok()
    })?
    else {
        return Ok(None);
    };

    match ask_until(input, "Begin migration? [Y/n]", "y", yes_no)? {
        Some(true) => Ok(Some(Answers {
            args: ImportArgs {
                file,
                source,
                offset: Some(offset),
                ..base.clone()
            },
            import_to_dev,
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod prompt_tests {
    use super::*;
    use std::collections::VecDeque;

    struct Scripted(VecDeque<&'static str>);

    impl Ask for Scripted {
        fn ask(&mut self, _question: &str) -> anyhow::Result<Option<String>> {
            Ok(self.0.pop_front().map(str::to_string))
        }
    }

    fn scripted(lines: &[&'static str]) -> Scripted {
        Scripted(lines.iter().copied().collect())
    }

    #[test]
    fn defaults_are_taken_on_empty_answers() {
        let answers = collect(&mut scripted(&["", "", "", "", ""]), &ImportArgs::default(), 0)
            .unwrap()
            .unwrap();
        assert_eq!(answers.args.source, SourcePlatform::Clerk);
        assert_eq!(answers.args.file, PathBuf::from("users.json"));
        assert_eq!(answers.args.offset, Some(0));
        assert!(!answers.import_to_dev);
    }

    #[test]
    fn explicit_answers_override() {
        let answers = collect(
            &mut scripted(&["auth0", "./export.json", "dev", "25", "yes"]),
            &ImportArgs::default(),
            0,
        )
        .unwrap()
        .unwrap();
        assert_eq!(answers.args.source, SourcePlatform::Auth0);
        assert_eq!(answers.args.file, PathBuf::from("./export.json"));
        assert_eq!(answers.args.offset, Some(25));
        assert!(answers.import_to_dev);
    }

    #[test]
    fn invalid_answers_are_asked_again() {
        let answers = collect(
            &mut scripted(&["okta", "supabase", "", "staging", "prod", "ten", "3", "y"]),
            &ImportArgs::default(),
            0,
        )
        .unwrap()
        .unwrap();
        assert_eq!(answers.args.source, SourcePlatform::Supabase);
        assert_eq!(answers.args.offset, Some(3));
    }

    #[test]
    fn offset_default_comes_from_configuration() {
        let answers = collect(&mut scripted(&["", "", "", "", ""]), &ImportArgs::default(), 100)
            .unwrap()
            .unwrap();
        assert_eq!(answers.args.offset, Some(100));

        let base = ImportArgs {
            offset: Some(7),
            ..ImportArgs::default()
        };
        let answers = collect(&mut scripted(&["", "", "", "", ""]), &base, 100)
            .unwrap()
            .unwrap();
        assert_eq!(answers.args.offset, Some(7));
    }

    #[test]
    fn declining_or_cancelling_returns_none() {
        let declined =
            collect(&mut scripted(&["", "", "", "", "n"]), &ImportArgs::default(), 0).unwrap();
        assert!(declined.is_none());
        let cancelled = collect(&mut scripted(&["clerk"]), &ImportArgs::default(), 0).unwrap();
        assert!(cancelled.is_none());
    }
}
