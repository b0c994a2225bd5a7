//! 初始化数据库：创建管理员账号和示例专家数据

use expert_backend::{
    config::Config,
    routes::expert::model::{Expert, ExpertPayload},
    routes::user::model::{CreateUserRequest, User},
    utils::ROLE_ADMIN,
};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "admin123456";

fn sample_experts() -> Vec<ExpertPayload> {
    vec![
        ExpertPayload {
            name: "张三".into(),
            field: "人工智能,机器学习".into(),
            specialty: "深度学习,自然语言处理".into(),
            organization: Some("XX大学计算机学院".into()),
            contact: Some("zhangsan@example.com".into()),
            education: Some("博士".into()),
            title: Some("教授".into()),
            research_direction: Some("计算机视觉与模式识别".into()),
            awards: Some("2023年国家科技进步奖二等奖\n2022年省级科技创新奖".into()),
            achievements: Some("发表SCI论文50余篇\n主持国家自然科学基金项目3项".into()),
            bio: Some(
                "张三教授是人工智能领域的知名专家，在深度学习和计算机视觉方面有着丰富的研究经验。"
                    .into(),
            ),
            photo_url: None,
        },
        ExpertPayload {
            name: "李四".into(),
            field: "数据科学,统计学".into(),
            specialty: "数据挖掘,预测分析".into(),
            organization: Some("YY研究院".into()),
            contact: Some("lisi@example.com".into()),
            education: Some("博士".into()),
            title: Some("研究员".into()),
            research_direction: Some("大数据分析与应用".into()),
            awards: Some("2022年优秀青年科学家奖".into()),
            achievements: Some("出版专著《数据科学导论》\n开发多个数据分析平台".into()),
            bio: Some("李四博士专注于数据科学研究，在大数据处理和分析方面经验丰富。".into()),
            photo_url: None,
        },
        ExpertPayload {
            name: "王五".into(),
            field: "网络安全,信息安全".into(),
            specialty: "密码学,安全协议".into(),
            organization: Some("ZZ科技公司".into()),
            contact: Some("wangwu@example.com".into()),
            education: Some("硕士".into()),
            title: Some("高级工程师".into()),
            research_direction: Some("网络安全防护技术".into()),
            awards: Some("2021年网络安全技术创新奖".into()),
            achievements: Some("获得发明专利10余项\n参与制定行业安全标准3项".into()),
            bio: Some("王五工程师在网络安全领域有着丰富的实战经验。".into()),
            photo_url: None,
        },
    ]
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().expect("Failed to load configuration");

    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    // 创建管理员用户
    match User::find_by_email(&pool, ADMIN_EMAIL).await {
        Ok(Some(_)) => tracing::info!("管理员用户已存在"),
        Ok(None) => {
            let req = CreateUserRequest {
                email: ADMIN_EMAIL.into(),
                name: "系统管理员".into(),
                password: ADMIN_PASSWORD.into(),
                role: Some(ROLE_ADMIN.into()),
            };
            let admin = User::create(&pool, &req)
                .await
                .expect("Failed to create admin user");
            tracing::info!(
                "管理员用户创建成功: 邮箱 {} 用户ID {}",
                ADMIN_EMAIL,
                admin.id
            );
        }
        Err(e) => panic!("Failed to look up admin user: {:?}", e),
    }

    // 创建示例专家数据
    for payload in sample_experts() {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM experts WHERE name = $1")
            .bind(&payload.name)
            .fetch_one(&pool)
            .await
            .expect("Failed to check for existing expert");

        if exists == 0 {
            Expert::create(&pool, &payload)
                .await
                .expect("Failed to create sample expert");
            tracing::info!("创建示例专家: {}", payload.name);
        }
    }

    tracing::info!("数据库初始化完成");
}
