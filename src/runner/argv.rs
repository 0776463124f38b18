//! Command line tokenizer
//!
//! Turns a raw command string into pipeline stages without a shell:
//!
//! - `|` separates stages, whitespace separates arguments
//! - `'...'` is literal
//! - `"..."` keeps whitespace but still expands `$` references and
//!   substitutions; `\"`, `\\`, `\$` and `` \` `` are escapes
//! - outside quotes a backslash escapes the next character
//! - `$NAME`, `${...}` go through the expansion callback
//! - `$(...)` and `` `...` `` go through the substitution callback
//!
//! Expanded or substituted text is never split into further words. An unquoted
//! reference that expands to nothing does not produce an argument.

use crate::error::{CommandError, CommandResult};

struct Tokenizer<'a, 's> {
    input: &'a str,
    chars: Vec<char>,
    pos: usize,
    expand: &'a dyn Fn(&str) -> String,
    substitute: &'s mut dyn FnMut(&str) -> CommandResult<String>,
}

/// Tokenize `input` into pipeline stages of program + arguments
pub fn tokenize(
    input: &str,
    expand: &dyn Fn(&str) -> String,
    substitute: &mut dyn FnMut(&str) -> CommandResult<String>,
) -> CommandResult<Vec<Vec<String>>> {
    let mut tokenizer = Tokenizer {
        input,
        chars: input.chars().collect(),
        pos: 0,
        expand,
        substitute,
    };
    tokenizer.run()
}

impl Tokenizer<'_, '_> {
    fn error(&self, reason: &str) -> CommandError {
        CommandError::Parse {
            input: self.input.to_string(),
            reason: reason.to_string(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn run(&mut self) -> CommandResult<Vec<Vec<String>>> {
        let mut stages: Vec<Vec<String>> = Vec::new();
        let mut args: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut in_token = false;

        while let Some(c) = self.peek() {
            match c {
                c if c.is_whitespace() => {
                    self.pos += 1;
                    if in_token {
                        args.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                }
                '|' => {
                    self.pos += 1;
                    if in_token {
                        args.push(std::mem::take(&mut current));
                        in_token = false;
                    }
                    if args.is_empty() {
                        return Err(self.error("empty pipeline stage"));
                    }
                    stages.push(std::mem::take(&mut args));
                }
                '\'' => {
                    self.pos += 1;
                    in_token = true;
                    self.single_quoted(&mut current)?;
                }
                '"' => {
                    self.pos += 1;
                    in_token = true;
                    self.double_quoted(&mut current)?;
                }
                '\\' => {
                    self.pos += 1;
                    let escaped = self.peek().ok_or_else(|| self.error("trailing backslash"))?;
                    self.pos += 1;
                    current.push(escaped);
                    in_token = true;
                }
                '$' => {
                    let text = self.dollar()?;
                    if !text.is_empty() {
                        current.push_str(&text);
                        in_token = true;
                    }
                }
                '`' => {
                    let text = self.backquote()?;
                    if !text.is_empty() {
                        current.push_str(&text);
                        in_token = true;
                    }
                }
                _ => {
                    self.pos += 1;
                    current.push(c);
                    in_token = true;
                }
            }
        }

        if in_token {
            args.push(current);
        }
        if args.is_empty() {
            if stages.is_empty() {
                return Err(CommandError::EmptyCommandLine);
            }
            return Err(self.error("empty pipeline stage"));
        }
        stages.push(args);
        Ok(stages)
    }

    fn single_quoted(&mut self, out: &mut String) -> CommandResult<()> {
        while let Some(c) = self.peek() {
            self.pos += 1;
            if c == '\'' {
                return Ok(());
            }
            out.push(c);
        }
        Err(self.error("unterminated single quote"))
    }

    fn double_quoted(&mut self, out: &mut String) -> CommandResult<()> {
        while let Some(c) = self.peek() {
            match c {
                '"' => {
                    self.pos += 1;
                    return Ok(());
                }
                '\\' => {
                    self.pos += 1;
                    match self.peek() {
                        Some(e @ ('"' | '\\' | '$' | '`')) => {
                            self.pos += 1;
                            out.push(e);
                        }
                        _ => out.push('\\'),
                    }
                }
                '$' => {
                    let text = self.dollar()?;
                    out.push_str(&text);
                }
                '`' => {
                    let text = self.backquote()?;
                    out.push_str(&text);
                }
                _ => {
                    self.pos += 1;
                    out.push(c);
                }
            }
        }
        Err(self.error("unterminated double quote"))
    }

    /// Handle a `$` at the current position
    fn dollar(&mut self) -> CommandResult<String> {
        let start = self.pos;
        self.pos += 1;
        match self.peek() {
            Some('$') => {
                self.pos += 1;
                Ok("$".to_string())
            }
            Some('{') => {
                let close = self.chars[self.pos..]
                    .iter()
                    .position(|&c| c == '}')
                    .ok_or_else(|| self.error("unterminated variable reference"))?;
                self.pos += close + 1;
                let reference: String = self.chars[start..self.pos].iter().collect();
                Ok((self.expand)(&reference))
            }
            Some('(') => {
                self.pos += 1;
                let inner_start = self.pos;
                let inner_end = self.matching_paren()?;
                let command: String = self.chars[inner_start..inner_end].iter().collect();
                self.pos = inner_end + 1;
                self.run_substitution(&command)
            }
            Some(c) if c == '_' || c.is_ascii_alphabetic() => {
                while matches!(self.peek(), Some(c) if c == '_' || c.is_ascii_alphanumeric()) {
                    self.pos += 1;
                }
                let reference: String = self.chars[start..self.pos].iter().collect();
                Ok((self.expand)(&reference))
            }
            _ => Ok("$".to_string()),
        }
    }

    /// Find the `)` closing a `$(` whose body starts at the current position
    fn matching_paren(&self) -> CommandResult<usize> {
        let mut depth = 1;
        let mut i = self.pos;
        let mut quote: Option<char> = None;
        while i < self.chars.len() {
            let c = self.chars[i];
            match quote {
                Some(q) => {
                    if c == '\\' && q == '"' {
                        i += 1;
                    } else if c == q {
                        quote = None;
                    }
                }
                None => match c {
                    '\'' | '"' => quote = Some(c),
                    '\\' => i += 1,
                    '(' => depth += 1,
                    ')' => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(i);
                        }
                    }
                    _ => {}
                },
            }
            i += 1;
        }
        Err(self.error("unterminated command substitution"))
    }

    fn backquote(&mut self) -> CommandResult<String> {
        self.pos += 1;
        let close = self.chars[self.pos..]
            .iter()
            .position(|&c| c == '`')
            .ok_or_else(|| self.error("unterminated command substitution"))?;
        let command: String = self.chars[self.pos..self.pos + close].iter().collect();
        self.pos += close + 1;
        self.run_substitution(&command)
    }

    fn run_substitution(&mut self, command: &str) -> CommandResult<String> {
        tracing::debug!(command, "running command substitution");
        (self.substitute)(command).map_err(|e| CommandError::Substitution {
            command: command.to_string(),
            source: Box::new(e),
        })
    }
}
