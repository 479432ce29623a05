//! Failing builds and unusable databases.

use crate::e2e::*;

#[test]
fn missing_database() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    space.write("out.do", "touch \"$1\"\n")?;
    let out = space.run_fail(&mut redo_command(vec!["build", "out"]))?;
    assert_stderr_contains(&out, "redo: error: cannot find redo database");
    assert!(!space.exists("out"));
    Ok(())
}

#[test]
fn incompatible_database() -> anyhow::Result<()> {
    let space = TestSpace::new()?;
    let mut db = b"REDO".to_vec();
    db.extend_from_slice(&99u32.to_le_bytes());
    std::fs::write(space.path("_redo.db"), &db)?;
    space.write("out.do", "touch \"$1\"\n")?;

    let out = space.run_fail(&mut redo_command(vec!["build", "out"]))?;
    assert_stderr_contains(&out, "incompatible database version 99");
    assert!(!space.exists("out"));
    assert_eq!(space.read("_redo.db")?, db);
    Ok(())
}

#[test]
fn missing_script() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    let out = space.run_fail(&mut redo_command(vec!["build", "nothing.o"]))?;
    assert_stderr_contains(&out, "cannot find script for target");
    assert_stderr_contains(&out, "default.o.do");
    Ok(())
}

#[test]
fn failed_build_leaves_database() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("hello.c", "")?;
    space.write("prog.do", PROG_SCRIPT)?;
    space.run_expect(&mut redo_command(vec!["build", "prog"]))?;
    let before = space.read("_redo.db")?;

    space.write("bad.do", "redo ifchange hello.c\nexit 3\n")?;
    let out = space.run_fail(&mut redo_command(vec!["build", "bad"]))?;
    assert_stderr_contains(&out, "build failed");
    assert_eq!(space.read("_redo.db")?, before);
    Ok(())
}

#[test]
fn failed_dependency_fails_parent() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("broken.do", "exit 1\n")?;
    space.write("top.do", "redo ifchange broken\necho top >> runs\n")?;
    let out = space.run_fail(&mut redo_command(vec!["build", "top"]))?;
    assert_stderr_contains(&out, "broken.do");
    // The parent script stops at its failed declaration.
    assert!(space.lines("runs")?.is_empty());
    Ok(())
}

#[test]
fn cycle() -> anyhow::Result<()> {
    let space = TestSpace::init()?;
    space.write("a.do", "redo ifchange b\n")?;
    space.write("b.do", "redo ifchange a\n")?;
    let out = space.run_fail(&mut redo_command(vec!["build", "a"]))?;
    assert_stderr_contains(&out, "dependency cycle");
    Ok(())
}
