use crate::e2e::*;

#[test]
fn init_creates_database() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.run_expect(&mut redo_command(vec!["init"]))?;
    assert!(space.exists("_redo.db"));

    let out = space.run_fail(&mut redo_command(vec!["init"]))?;
    assert_stderr_contains(&out, "already exists");
    Ok(())
}

#[test]
fn build_then_nothing_then_rebuild() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("hello.c", "int main() {}\n")?;
    space.set_mtime("hello.c", 1000)?;
    space.write("prog.do", PROG_SCRIPT)?;
    space.write("all.do", ALL_SCRIPT)?;

    let out = space.run_expect(&mut redo_command(vec!["build", "all"]))?;
    assert_output_contains(&out, "/all");
    assert_output_contains(&out, "/prog");
    assert_eq!(space.lines("runs")?, vec!["prog", "all"]);
    assert_eq!(space.read("prog")?, b"int main() {}\n");

    // prog is up to date; only the requested target runs.
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;
    assert_eq!(space.lines("runs")?, vec!["prog", "all", "all"]);

    space.write("hello.c", "int main() { return 1; }\n")?;
    space.set_mtime("hello.c", 2000)?;
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;
    assert_eq!(
        space.lines("runs")?,
        vec!["prog", "all", "all", "prog", "all"]
    );
    assert_eq!(space.read("prog")?, b"int main() { return 1; }\n");
    Ok(())
}

#[test]
fn script_edit_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("hello.c", "")?;
    space.write("prog.do", PROG_SCRIPT)?;
    space.set_mtime("prog.do", 1000)?;
    space.write("all.do", ALL_SCRIPT)?;
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;

    space.write("prog.do", &format!("{}echo edited >> runs\n", PROG_SCRIPT))?;
    space.set_mtime("prog.do", 2000)?;
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;
    assert_eq!(
        space.lines("runs")?,
        vec!["prog", "all", "prog", "edited", "all"]
    );
    Ok(())
}

#[test]
fn deleted_output_rebuilds() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("hello.c", "")?;
    space.write("prog.do", PROG_SCRIPT)?;
    space.write("all.do", ALL_SCRIPT)?;
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;

    std::fs::remove_file(space.path("prog"))?;
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;
    assert_eq!(space.lines("runs")?, vec!["prog", "all", "prog", "all"]);
    assert!(space.exists("prog"));
    Ok(())
}

#[test]
fn script_arguments_and_environment() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write(
        "out.txt.do",
        "echo \"$1|$2|$REDO_TARGET|$REDO_BASENAME\" > \"$1\"\n",
    )?;
    space.run_expect(&mut redo_command(vec!["build", "out.txt"]))?;

    let root = space.path("").canonicalize()?;
    let target = format!("{}/out.txt", root.display());
    let basename = format!("{}/out", root.display());
    let text = String::from_utf8(space.read("out.txt")?)?;
    assert_eq!(
        text.trim_end(),
        format!("{}|{}|{}|{}", target, basename, target, basename)
    );
    Ok(())
}

#[test]
fn default_script_in_parent_directory() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("default.o.do", "pwd > \"$1\"\n")?;
    space.write("src/lib/.keep", "")?;
    space.run_expect(&mut redo_command(vec!["build", "src/lib/x.o"]))?;

    // The script runs in its own directory, not the target's.
    let root = space.path("").canonicalize()?;
    let text = String::from_utf8(space.read("src/lib/x.o")?)?;
    assert_eq!(std::path::Path::new(text.trim_end()), root);
    Ok(())
}

#[test]
fn build_from_subdirectory() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("sub/leaf.do", "echo leaf > \"$1\"\n")?;
    let mut cmd = redo_command(vec!["build", "leaf"]);
    cmd.current_dir(space.path("sub"));
    let out = cmd.output()?;
    assert!(out.status.success());
    assert!(space.exists("sub/leaf"));
    Ok(())
}

#[test]
fn clean_keeps_sources() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("hello.c", "")?;
    space.write("prog.do", PROG_SCRIPT)?;
    space.write("all.do", ALL_SCRIPT)?;
    space.run_expect(&mut redo_command(vec!["build", "all"]))?;
    assert!(space.exists("prog"));

    let out = space.run_expect(&mut redo_command(vec!["clean"]))?;
    assert_output_contains(&out, "Cleaning");
    assert!(!space.exists("prog"));
    assert!(space.exists("hello.c"));
    assert!(space.exists("prog.do"));

    // A second clean has nothing left to delete.
    let out = space.run_expect(&mut redo_command(vec!["clean"]))?;
    assert!(out.stdout.is_empty());
    Ok(())
}

#[test]
fn tgf_lists_edges() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("hello.c", "")?;
    space.write("prog.do", PROG_SCRIPT)?;
    space.run_expect(&mut redo_command(vec!["build", "prog"]))?;

    let out = space.run_expect(&mut redo_command(vec!["tgf"]))?;
    let text = String::from_utf8(out.stdout)?;
    let (nodes, edges) = text.split_once("#\n").expect("separator");
    let id = |suffix: &str| -> String {
        nodes
            .lines()
            .find(|line| line.ends_with(suffix))
            .and_then(|line| line.split(' ').next())
            .expect("node")
            .to_owned()
    };
    let edges: Vec<&str> = edges.lines().collect();
    assert!(edges.contains(&format!("{} {}", id("/prog"), id("/prog.do")).as_str()));
    assert!(edges.contains(&format!("{} {}", id("/prog"), id("/hello.c")).as_str()));
    Ok(())
}

#[test]
fn quiet_logging() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("out.do", "touch \"$1\"\n")?;
    let out = space.run_expect(&mut redo_command(vec![
        "--logging-level",
        "0",
        "build",
        "out",
    ]))?;
    assert!(out.stdout.is_empty());
    Ok(())
}
