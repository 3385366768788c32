//! End-to-end tests driving the `swish` binary.

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use assert_cmd::Command;
use predicates::str::contains;

fn swish() -> Command {
    Command::cargo_bin("swish").expect("swish binary builds")
}

fn run_c(script: &str) -> assert_cmd::assert::Assert {
    swish().args(["-c", script]).assert()
}

fn write_script(path: &Path, contents: &str, executable: bool) {
    let mut f = std::fs::File::create(path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    drop(f);
    if executable {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }
}

#[test]
fn sequential_commands_run_in_order() {
    run_c("echo a; echo b").success().stdout("a\nb\n");
}

#[test]
fn and_or_connectives_short_circuit() {
    run_c("false && echo x || echo y").success().stdout("y\n");
    run_c("true && echo x || echo y").success().stdout("x\n");
}

#[test]
fn for_loop_iterates_words() {
    run_c("for i in 1 2 3; do echo $i; done")
        .success()
        .stdout("1\n2\n3\n");
}

#[test]
fn while_loop_breaks_on_condition() {
    run_c("i=0; while true; do i=$((i+1)); if [ $i = 2 ]; then break; fi; done; echo $i")
        .success()
        .stdout("2\n");
}

#[test]
fn function_return_sets_status() {
    run_c("f(){ return 7; }; f; echo $?").success().stdout("7\n");
}

#[test]
fn pipeline_passes_data_through_stages() {
    run_c("echo hi | cat | cat").success().stdout("hi\n");
}

#[test]
fn pipeline_status_is_last_stage() {
    run_c("true | false").code(1);
    run_c("false | true").code(0);
}

#[test]
fn pipelines_are_deterministic_across_runs() {
    let first = swish()
        .args(["-c", "echo payload | cat | cat"])
        .output()
        .unwrap();
    let second = swish()
        .args(["-c", "echo payload | cat | cat"])
        .output()
        .unwrap();
    assert_eq!(first.status.code(), second.status.code());
    assert_eq!(first.stdout, second.stdout);
}

#[test]
fn exit_builtin_sets_process_status() {
    run_c("exit 3").code(3);
}

#[test]
fn subshells_do_not_mutate_the_parent() {
    run_c("x=parent; (x=child; true); echo $x")
        .success()
        .stdout("parent\n");
}

#[test]
fn subshell_status_propagates() {
    run_c("(exit 5); echo $?").success().stdout("5\n");
}

#[test]
fn output_redirections_write_files() {
    let dir = tempfile::tempdir().unwrap();

    swish()
        .current_dir(dir.path())
        .args(["-c", "echo data > out.txt; cat out.txt"])
        .assert()
        .success()
        .stdout("data\n");

    swish()
        .current_dir(dir.path())
        .args(["-c", "echo more >> out.txt; cat out.txt"])
        .assert()
        .success()
        .stdout("data\nmore\n");
}

#[test]
fn input_redirection_reads_files() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("in.txt"), "from file\n").unwrap();

    swish()
        .current_dir(dir.path())
        .args(["-c", "cat < in.txt"])
        .assert()
        .success()
        .stdout("from file\n");
}

#[test]
fn fd_duplication_routes_streams() {
    run_c("echo oops 1>&2").success().stdout("").stderr("oops\n");
}

#[test]
fn heredocs_feed_standard_input() {
    run_c("cat <<EOF\nhello doc\nEOF")
        .success()
        .stdout("hello doc\n");
}

#[test]
fn heredoc_expansion_honors_quoted_delimiter() {
    run_c("x=42; cat <<EOF\nvalue: $x\nEOF")
        .success()
        .stdout("value: 42\n");
    run_c("x=42; cat <<'EOF'\nvalue: $x\nEOF")
        .success()
        .stdout("value: $x\n");
}

#[test]
fn command_substitution_captures_output() {
    run_c("x=$(echo hi); echo \"[$x]\"").success().stdout("[hi]\n");
    run_c("echo `echo nested`").success().stdout("nested\n");
    run_c("x=$(echo hi | cat); echo $x").success().stdout("hi\n");
}

#[test]
fn arithmetic_expansion_computes() {
    run_c("echo $((6*7))").success().stdout("42\n");
    run_c("i=1; i=$((i+1)); echo $i").success().stdout("2\n");
}

#[test]
fn parameter_expansion_defaults() {
    run_c("echo ${missing:-fallback}").success().stdout("fallback\n");
    run_c("x=set; echo ${x:-fallback}").success().stdout("set\n");
}

#[test]
fn case_matches_patterns_in_order() {
    run_c("case abc in ab*) echo yes;; *) echo no;; esac")
        .success()
        .stdout("yes\n");
}

#[test]
fn quoting_preserves_spaces() {
    run_c("echo \"a b\" c").success().stdout("a b c\n");
}

#[test]
fn unknown_command_reports_127() {
    run_c("definitely-not-a-real-command-xyzq")
        .code(127)
        .stderr(contains("not found"));
}

#[test]
fn errexit_stops_the_script() {
    swish()
        .args(["-e", "-c", "false; echo unreachable"])
        .assert()
        .code(1)
        .stdout("");
}

#[test]
fn nounset_flags_unset_references() {
    swish()
        .args(["-u", "-c", "echo $never_set_anywhere"])
        .assert()
        .code(2)
        .stderr(contains("parameter not set"));
}

#[test]
fn xtrace_prints_commands_to_stderr() {
    swish()
        .args(["-x", "-c", "echo traced"])
        .assert()
        .success()
        .stdout("traced\n")
        .stderr(contains("+ echo traced"));
}

#[test]
fn script_files_run_with_positional_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("args.sh");
    write_script(&script, "echo $# $1 $2\n", false);

    swish()
        .arg(script.to_str().unwrap())
        .args(["first", "second"])
        .assert()
        .success()
        .stdout("2 first second\n");
}

#[test]
fn dot_builtin_sources_into_current_shell() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("defs.sh");
    write_script(&script, "sourced_var=hello\n", false);

    swish()
        .args(["-c", &format!(". {}; echo $sourced_var", script.display())])
        .assert()
        .success()
        .stdout("hello\n");
}

#[test]
fn exec_replaces_the_shell() {
    run_c("exec echo replaced").success().stdout("replaced\n");
}

#[test]
fn exec_failure_reports_not_found() {
    run_c("exec no-such-command-zzz").code(127);
}

#[test]
fn background_jobs_run_and_wait_reaps_them() {
    run_c("true & wait; echo done").success().stdout("done\n");
}

#[test]
fn exit_trap_runs_at_shutdown() {
    run_c("trap 'echo trapped' EXIT; echo main")
        .success()
        .stdout("main\ntrapped\n");
}

#[test]
fn eval_and_direct_execution_agree() {
    let direct = swish().args(["-c", "echo same; exit 4"]).output().unwrap();
    let evaled = swish()
        .args(["-c", "eval 'echo same; exit 4'"])
        .output()
        .unwrap();
    assert_eq!(direct.status.code(), evaled.status.code());
    assert_eq!(direct.stdout, evaled.stdout);
}

#[test]
fn globbing_expands_sorted_matches() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("b.txt"), "").unwrap();
    std::fs::write(dir.path().join("a.txt"), "").unwrap();
    std::fs::write(dir.path().join("c.log"), "").unwrap();

    swish()
        .current_dir(dir.path())
        .args(["-c", "echo *.txt"])
        .assert()
        .success()
        .stdout("a.txt b.txt\n");
}

#[test]
fn scripts_without_shebang_reenter_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("plain");
    write_script(&script, "echo interpreted $1\n", true);

    let path_value = format!("{}:{}", dir.path().display(), std::env::var("PATH").unwrap());
    swish()
        .env("PATH", path_value)
        .args(["-c", "plain here"])
        .assert()
        .success()
        .stdout("interpreted here\n");
}

#[test]
fn shebang_scripts_run_normally() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("withbang");
    write_script(&script, "#!/bin/sh\necho via shebang\n", true);

    run_c(&format!("{}", script.display()))
        .success()
        .stdout("via shebang\n");
}

#[test]
fn path_cache_recovers_after_hash_r() {
    let dir_a = tempfile::tempdir().unwrap();
    let dir_b = tempfile::tempdir().unwrap();
    write_script(&dir_a.path().join("probe"), "#!/bin/sh\necho A\n", true);
    write_script(&dir_b.path().join("probe"), "#!/bin/sh\necho B\n", true);

    let path_value = format!(
        "{}:{}:{}",
        dir_a.path().display(),
        dir_b.path().display(),
        std::env::var("PATH").unwrap()
    );
    let remove_first = format!("rm {}/probe", dir_a.path().display());

    swish()
        .env("PATH", path_value)
        .args(["-c", &format!("probe; {remove_first}; hash -r; probe")])
        .assert()
        .success()
        .stdout("A\nB\n");
}

#[test]
fn nested_loops_and_functions_compose() {
    run_c(concat!(
        "count() { echo $1; }; ",
        "for a in 1 2; do for b in x y; do count $a$b; done; done"
    ))
    .success()
    .stdout("1x\n1y\n2x\n2y\n");
}

#[test]
fn break_and_continue_cross_levels() {
    run_c("for a in 1 2 3; do for b in x y; do break 2; done; echo $a; done").success().stdout("");
    run_c("for a in 1 2 3; do if [ $a = 2 ]; then continue; fi; echo $a; done")
        .success()
        .stdout("1\n3\n");
}

#[test]
fn cd_changes_directory_and_updates_pwd() {
    let dir = tempfile::tempdir().unwrap();
    let canonical = dir.path().canonicalize().unwrap();

    swish()
        .args(["-c", &format!("cd {}; pwd; echo $PWD", dir.path().display())])
        .assert()
        .success()
        .stdout(format!("{0}\n{0}\n", canonical.display()));
}

#[test]
fn until_loop_and_shift_work_together() {
    swish()
        .args(["-c", "until [ $# = 0 ]; do echo $1; shift; done", "sh", "p", "q"])
        .assert()
        .success()
        .stdout("p\nq\n");
}
