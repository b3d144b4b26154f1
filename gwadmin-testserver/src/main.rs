use std::net::SocketAddr;

use tokio::net::TcpListener;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let mut bind_addr: SocketAddr = "127.0.0.1:0".parse()?;
    let gateway = gwadmin_testserver::Gateway::default();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--bind" => {
                let addr = args.next().ok_or_else(|| {
                    anyhow::anyhow!("--bind requires an address, e.g. 127.0.0.1:8000")
                })?;
                bind_addr = addr.parse()?;
            }
            "--user" => {
                let user = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--user requires NAME:PASSWORD"))?;
                let (name, password) = user
                    .split_once(':')
                    .ok_or_else(|| anyhow::anyhow!("--user expects NAME:PASSWORD, got {user}"))?;
                gateway.seed_user(name, password);
            }
            "-h" | "--help" => {
                eprintln!(
                    "gwadmin-testserver\n\nUSAGE:\n  gwadmin-testserver [--bind 127.0.0.1:0] [--user NAME:PASSWORD]...\n\nOUTPUT:\n  Prints HTTP_URL=<url> to stdout once ready."
                );
                return Ok(());
            }
            other => {
                return Err(anyhow::anyhow!("unknown argument: {other}"));
            }
        }
    }

    let listener = TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    let app = gwadmin_testserver::router(gateway);

    println!("HTTP_URL=http://{addr}");

    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
    });

    serve.await?;
    Ok(())
}
