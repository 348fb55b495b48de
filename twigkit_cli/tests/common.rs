use assert_cmd::Command;
use insta_cmd::get_cargo_bin;

pub fn twigkit_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("twigkit"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("TWIGKIT_LOG");
	cmd
}
