#[derive(Debug, Default)]
struct CliArgs {
    api_base: Option<String>,
    offline: bool,
}

fn main() -> anyhow::Result<()> {
    colog::init();
    let args = parse_args(std::env::args().skip(1).collect())?;

    airtune::app::run(airtune::app::AppOptions {
        api_base: args.api_base,
        offline: args.offline,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--api" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--api requires a base URL");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--api cannot be empty");
                }
                out.api_base = Some(value.trim().trim_end_matches('/').to_string());
            }
            "--offline" => out.offline = true,
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("Airtune");
    println!("  --api <url>   Aggregation API base URL");
    println!("  --offline     Run without any remote service");
}
