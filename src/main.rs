//! Trawl - Programmatic Web Browsing
//!
//! Entry point for the `trawl` command line client.

use serde_json::json;
use std::env;
use std::process;
use trawl::engine::{ParserMode, ProxyConfig};
use trawl::network::RequestBody;
use trawl::{Page, Result, Session, SessionConfig, TrawlError, NAME, VERSION};

const USAGE: &str = "\
usage: trawl [options] get <url> [name=value...]
       trawl [options] post <url> <body>
       trawl [options] mock <url> <raw-response-file>

options:
  --parser <html|xml|auto>  document parser (default auto)
  --no-meta-refresh         do not follow <meta http-equiv=refresh>
  --convert-urls            make img/a URLs absolute
  --cache                   enable the response cache in ./cache
  --cache-expire <secs>     cache entry lifetime, 0 keeps forever
  --user-agent <ua>         User-Agent header
  --timeout <ms>            request timeout
  --proxy <host:port>       forward proxy
  --json                    print the summary as JSON";

struct Options {
    config: SessionConfig,
    json: bool,
    command: Vec<String>,
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        println!("{} v{}\n\n{}", NAME, VERSION, USAGE);
        return;
    }

    if let Err(e) = run(&args) {
        eprintln!("❌ {}", e);
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<()> {
    let options = parse_options(args)?;
    let mut session = Session::new(options.config)?;

    let page = match options.command.as_slice() {
        [cmd, url, params @ ..] if cmd == "get" => {
            let params = params
                .iter()
                .map(|p| p.split_once('=').unwrap_or((p.as_str(), "")))
                .collect::<Vec<_>>();
            session.get(url, &params)?
        }
        [cmd, url, body] if cmd == "post" => {
            let headers = vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )];
            session.post(url, RequestBody::Text(body.clone()), &headers)?
        }
        [cmd, url, file] if cmd == "mock" => session.mock(url, file)?,
        _ => return Err(usage_error("expected a get, post or mock command")),
    };

    if options.json {
        println!("{:#}", summary(&page));
    } else {
        print_page(&page);
    }
    Ok(())
}

fn parse_options(args: &[String]) -> Result<Options> {
    let mut config = SessionConfig::default();
    let mut json = false;
    let mut command = Vec::new();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .cloned()
                .ok_or_else(|| usage_error(&format!("{flag} needs a value")))
        };
        match arg.as_str() {
            "--parser" => config.parser_mode = value("--parser")?.parse::<ParserMode>()?,
            "--no-meta-refresh" => config.follow_meta_refresh = false,
            "--convert-urls" => config.convert_urls = true,
            "--cache" => config.cache.enabled = true,
            "--cache-expire" => {
                config.cache.expire_after_secs = value("--cache-expire")?
                    .parse()
                    .map_err(|_| usage_error("--cache-expire takes seconds"))?
            }
            "--user-agent" => config.transport.user_agent = value("--user-agent")?,
            "--timeout" => {
                let millis: u64 = value("--timeout")?
                    .parse()
                    .map_err(|_| usage_error("--timeout takes milliseconds"))?;
                config.transport.timeout = Some(std::time::Duration::from_millis(millis));
            }
            "--proxy" => config.transport.proxy = Some(value("--proxy")?.parse::<ProxyConfig>()?),
            "--json" => json = true,
            flag if flag.starts_with("--") => {
                return Err(usage_error(&format!("unknown option {flag}")));
            }
            _ => command.push(arg.clone()),
        }
    }

    Ok(Options {
        config,
        json,
        command,
    })
}

fn usage_error(message: &str) -> TrawlError {
    TrawlError::Config(format!("{message}\n\n{USAGE}"))
}

fn print_page(page: &Page) {
    let status = page
        .status()
        .map_or_else(|| "-".to_string(), |code| code.to_string());
    println!("🌐 {} [{}]", page.url(), status);
    if !page.title().is_empty() {
        println!("📄 {}", page.title());
    }
    for diagnostic in page.diagnostics() {
        println!("⚠️  {:?}", diagnostic);
    }
    for (index, form) in page.forms().iter().enumerate() {
        println!("📝 form {} {} {}", index, form.method().to_uppercase(), form.action());
        for (name, value) in form.fields() {
            println!("   • {} = {:?}", name, value);
        }
    }
}

fn summary(page: &Page) -> serde_json::Value {
    let forms: Vec<_> = page
        .forms()
        .iter()
        .map(|form| {
            json!({
                "action": form.action(),
                "method": form.method(),
                "enctype": form.enctype(),
                "fields": form.fields(),
            })
        })
        .collect();
    json!({
        "url": page.url(),
        "status": page.status(),
        "title": page.title(),
        "base_href": page.base_href(),
        "headers": page.headers(),
        "forms": forms,
        "diagnostics": page.diagnostics().iter().map(|d| format!("{d:?}")).collect::<Vec<_>>(),
    })
}
