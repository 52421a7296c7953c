// 声明模块结构：
// `application`: 应用启动逻辑。
// `handlers`: 计数与指标请求处理逻辑。
// `state`: 应用共享状态定义。
mod application;
mod handlers;
mod state;


use std::io;

// `#[actix_web::main]` 宏在后台启动 actix 的系统运行时。
#[actix_web::main]
async fn main() -> io::Result<()> {
    // 启动失败时打印错误到标准错误输出，并以非零状态码退出。
    if let Err(err) = application::run().await {
        eprintln!("[api] bootstrap failed: {err}");
        return Err(io::Error::other(err.to_string()));
    }

    Ok(())
}
