//! test / [ - Evaluate conditional expressions
//!
//! Grammar (loosest first): `expr -o expr`, `expr -a expr`, `! expr`,
//! `( expr )`, binary operators, unary operators, a lone string.
//! Status 0 is true, 1 false, 2 a usage error.

use super::BuiltinContext;
use crate::interpreter::errors::InterpreterError;
use crate::interpreter::interpreter::ShellFs;
use crate::interpreter::types::{ExecResult, InterpreterState};

const UNARY_OPERATORS: &[&str] = &[
    "-e", "-a", "-f", "-d", "-s", "-r", "-w", "-x", "-L", "-h", "-z", "-n", "-v",
];
const BINARY_OPERATORS: &[&str] = &[
    "=", "==", "!=", "<", ">", "-eq", "-ne", "-lt", "-le", "-gt", "-ge", "-nt", "-ot", "-ef",
];

pub fn handle_test(ctx: &mut BuiltinContext<'_>) -> Result<ExecResult, InterpreterError> {
    let args = if ctx.name == "[" {
        match ctx.args.split_last() {
            Some((last, rest)) if last == "]" => rest,
            _ => return Ok(ctx.usage_error("missing `]'")),
        }
    } else {
        ctx.args
    };

    let mut evaluator = TestEvaluator {
        args,
        pos: 0,
        state: ctx.state,
        fs: ctx.engine.fs.as_ref(),
    };
    let outcome = evaluator.evaluate();
    Ok(match outcome {
        Ok(true) => ExecResult::ok(),
        Ok(false) => ExecResult::with_code(1),
        Err(message) => ctx.usage_error(message),
    })
}

struct TestEvaluator<'a> {
    args: &'a [String],
    pos: usize,
    state: &'a InterpreterState,
    fs: &'a dyn ShellFs,
}

impl TestEvaluator<'_> {
    fn evaluate(&mut self) -> Result<bool, String> {
        if self.args.is_empty() {
            return Ok(false);
        }
        let value = self.or_expr()?;
        match self.peek() {
            None => Ok(value),
            Some(extra) => Err(format!("{}: unexpected argument", extra)),
        }
    }

    fn peek(&self) -> Option<&str> {
        self.args.get(self.pos).map(String::as_str)
    }

    fn peek_at(&self, offset: usize) -> Option<&str> {
        self.args.get(self.pos + offset).map(String::as_str)
    }

    fn next(&mut self) -> Result<&str, String> {
        let arg = self.args.get(self.pos).ok_or_else(|| "argument expected".to_string())?;
        self.pos += 1;
        Ok(arg)
    }

    fn or_expr(&mut self) -> Result<bool, String> {
        let mut value = self.and_expr()?;
        while self.peek() == Some("-o") && self.peek_at(1).is_some() {
            self.pos += 1;
            let rhs = self.and_expr()?;
            value = value || rhs;
        }
        Ok(value)
    }

    fn and_expr(&mut self) -> Result<bool, String> {
        let mut value = self.not_expr()?;
        while self.peek() == Some("-a") && self.peek_at(1).is_some() {
            self.pos += 1;
            let rhs = self.not_expr()?;
            value = value && rhs;
        }
        Ok(value)
    }

    fn not_expr(&mut self) -> Result<bool, String> {
        if self.peek() == Some("!") && self.peek_at(1).is_some() {
            self.pos += 1;
            return Ok(!self.not_expr()?);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<bool, String> {
        if let Some(op) = self.peek_at(1) {
            if BINARY_OPERATORS.contains(&op) && self.peek_at(2).is_some() {
                let left = self.next()?.to_string();
                let op = self.next()?.to_string();
                let right = self.next()?.to_string();
                return self.binary(&left, &op, &right);
            }
        }
        if self.peek() == Some("(") {
            self.pos += 1;
            let value = self.or_expr()?;
            if self.next()? != ")" {
                return Err("`)' expected".to_string());
            }
            return Ok(value);
        }
        let first = self.next()?.to_string();
        if UNARY_OPERATORS.contains(&first.as_str()) {
            if let Some(operand) = self.peek().map(str::to_string) {
                self.pos += 1;
                return Ok(self.unary(&first, &operand));
            }
        }
        Ok(!first.is_empty())
    }

    fn unary(&self, op: &str, operand: &str) -> bool {
        let path = || self.fs.resolve_path(&self.state.cwd, operand);
        match op {
            "-z" => operand.is_empty(),
            "-n" => !operand.is_empty(),
            "-v" => self.state.env.is_set(operand),
            "-e" | "-a" | "-r" | "-w" => self.fs.exists(&path()),
            "-f" => self.fs.is_file(&path()),
            "-d" => self.fs.is_dir(&path()),
            "-s" => self.fs.stat(&path()).is_ok_and(|s| s.size > 0),
            "-x" => self.fs.stat(&path()).is_ok_and(|s| s.is_directory || s.mode & 0o111 != 0),
            _ => false,
        }
    }

    fn binary(&self, left: &str, op: &str, right: &str) -> Result<bool, String> {
        let int = |s: &str| -> Result<i64, String> {
            s.trim().parse::<i64>().map_err(|_| format!("{}: integer expression expected", s))
        };
        let mtime = |s: &str| {
            self.fs
                .stat(&self.fs.resolve_path(&self.state.cwd, s))
                .ok()
                .map(|stat| stat.mtime)
        };
        Ok(match op {
            "=" | "==" => left == right,
            "!=" => left != right,
            "<" => left < right,
            ">" => left > right,
            "-eq" => int(left)? == int(right)?,
            "-ne" => int(left)? != int(right)?,
            "-lt" => int(left)? < int(right)?,
            "-le" => int(left)? <= int(right)?,
            "-gt" => int(left)? > int(right)?,
            "-ge" => int(left)? >= int(right)?,
            "-nt" => match (mtime(left), mtime(right)) {
                (Some(l), Some(r)) => l > r,
                (Some(_), None) => true,
                _ => false,
            },
            "-ot" => match (mtime(left), mtime(right)) {
                (Some(l), Some(r)) => l < r,
                (None, Some(_)) => true,
                _ => false,
            },
            "-ef" => {
                let (l, r) = (self.fs.resolve_path(&self.state.cwd, left), self.fs.resolve_path(&self.state.cwd, right));
                l == r && self.fs.exists(&l)
            }
            _ => return Err(format!("{}: binary operator expected", op)),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::fs::{FileSystem, InMemoryFs, MkdirOptions};
    use crate::interpreter::builtins::test_support::{run_fresh, run_in};
    use crate::interpreter::types::InterpreterState;

    fn status(script: &str) -> i32 {
        run_fresh(script).exit_code
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_string_and_integer_operators() {
        assert_eq!(status("test abc = abc"), 0);
        assert_eq!(status("[ abc != abc ]"), 1);
        assert_eq!(status("[ b '>' a ]"), 0);
        assert_eq!(status("test -z ''"), 0);
        assert_eq!(status("test -n ''"), 1);
        assert_eq!(status("test word"), 0);
        assert_eq!(status("test ''"), 1);
        assert_eq!(status("test"), 1);
        assert_eq!(status("[ 10 -gt 9 ]"), 0);
        assert_eq!(status("[ -3 -le -3 ]"), 0);
        assert_eq!(status("[ 2 -ne 2 ]"), 1);
        assert_eq!(status("X=1; test -v X"), 0);
        assert_eq!(status("test -v UNSET_NAME"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_precedence() {
        // -a binds tighter than -o
        assert_eq!(status("test x -o '' -a ''"), 0);
        assert_eq!(status("test '' -a x -o x"), 0);
        assert_eq!(status("test '' -a x -o ''"), 1);
        assert_eq!(status("[ ! -z x ]"), 0);
        assert_eq!(status("[ ! a = a ]"), 1);
        assert_eq!(status("[ '(' a = b ')' -o c ]"), 0);
        assert_eq!(status("[ '(' a = b -o c ')' -a '' ]"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_usage_errors() {
        let result = run_fresh("test abc -gt 1");
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("abc: integer expression expected"));

        let result = run_fresh("[ a = a");
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("missing `]'"));

        let result = run_fresh("test a b");
        assert_eq!(result.exit_code, 2);
        assert!(result.stderr.contains("b: unexpected argument"));

        assert_eq!(status("[ '(' a ]"), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_file_operators() {
        let fs = Arc::new(InMemoryFs::new());
        fs.mkdir("/dir", &MkdirOptions { recursive: true }).await.unwrap();
        fs.write_file("/dir/full", b"data").await.unwrap();
        fs.write_file("/dir/empty", b"").await.unwrap();
        let mut state = InterpreterState::default();
        let script = "cd /dir
            for t in '-e full' '-f full' '-s full' '-d .' '-f empty' '-s empty' '-e missing' '-d full'; do
                test $t && echo \"$t yes\" || echo \"$t no\"
            done
            [ full -ef /dir/full ] && echo same";
        let result = run_in(fs, &mut state, script);
        assert_eq!(
            result.stdout,
            "-e full yes\n-f full yes\n-s full yes\n-d . yes\n-f empty yes\n-s empty no\n-e missing no\n-d full no\nsame\n"
        );
    }
}
