//! Assembles the blog server from configuration, storage and templates.

use crate::auth::SessionResolver;
use crate::config::AppConfig;
use crate::database::Database;
use crate::error::Result;
use crate::handlers::{routes, AppContext};
use awesome_core::{
    AuthMiddleware, LoggingMiddleware, Router, Server, StaticFiles, TemplateRenderer, TimingMiddleware,
};
use std::sync::Arc;
use tracing::info;

/// Server with every blog route, the middleware chain and static files
///
/// # Errors
///
/// Returns an error if the configured address is invalid or a route fails
/// to register.
pub fn build_server(config: &AppConfig, db: Database, renderer: Arc<dyn TemplateRenderer>) -> Result<Server> {
    let ctx = Arc::new(AppContext::new(config, db.clone()));

    let mut router = Router::new();
    router.add_routes(routes(&ctx))?;
    info!(routes = router.len(), "routes registered");

    let resolver = Arc::new(SessionResolver::new(db, ctx.codec.clone()));
    let mut server = Server::new(config.server_config()?, router)
        .with_renderer(renderer)
        .with_static_files(StaticFiles::new(
            config.static_files.prefix.clone(),
            config.static_files.directory.clone(),
        ));
    server.add_middleware(LoggingMiddleware::new());
    server.add_middleware(TimingMiddleware::new());
    server.add_middleware(AuthMiddleware::new(config.session.cookie_name.clone(), resolver));
    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::hash_password;
    use crate::models::{next_id, now, User, DEFAULT_IMAGE};
    use crate::templates::Templates;
    use awesome_core::session::sha1_hex;
    use awesome_core::{Bytes, Method, Response, SessionCodec};
    use serde_json::Value;
    use std::collections::HashMap;

    const FORM: &str = "application/x-www-form-urlencoded";

    struct App {
        server: Server,
        db: Database,
    }

    async fn app() -> App {
        let db = Database::connect("sqlite::memory:", 1).await.unwrap();
        db.init_schema().await.unwrap();
        let templates = Templates::from_sources([
            (
                "blogs.html",
                "{% for b in blogs %}[{{ b.name }}]{% endfor %} page {{ page.page_index }}/{{ page.page_count }}",
            ),
            ("blog.html", "<h1>{{ blog.name }}</h1>{{ blog.html_content|safe }}{{ comments|length }}"),
            ("signin.html", "signin {% if __user__ %}{{ __user__.name }}{% endif %}"),
            ("manage_blogs.html", "manage {{ page_index }}"),
        ])
        .unwrap();
        let server = build_server(&AppConfig::default(), db.clone(), Arc::new(templates)).unwrap();
        App { server, db }
    }

    impl App {
        async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
            self.server.test_request(Method::Get, path, headers(None, cookie), None).await
        }

        async fn post(&self, path: &str, form: &str, cookie: Option<&str>) -> Response {
            self.server
                .test_request(
                    Method::Post,
                    path,
                    headers(Some(FORM), cookie),
                    Some(Bytes::from(form.to_string())),
                )
                .await
        }

        async fn admin_cookie(&self) -> String {
            let id = next_id();
            let user = User {
                passwd: hash_password(&id, &sha1_hex("admin")),
                id,
                email: "admin@example.com".to_string(),
                admin: true,
                name: "Admin".to_string(),
                image: DEFAULT_IMAGE.to_string(),
                created_at: now(),
            };
            self.db.save(&user).await.unwrap();
            let token = SessionCodec::new("Awesome").encode(&user.id, &user.passwd, 3600);
            format!("awesession={token}")
        }

        async fn register(&self, email: &str) -> Response {
            let form = format!("email={email}&name=Reader&passwd={}", sha1_hex("secret"));
            self.post("/api/users", &form, None).await
        }
    }

    fn headers(content_type: Option<&str>, cookie: Option<&str>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        if let Some(ct) = content_type {
            headers.insert("content-type".to_string(), ct.to_string());
        }
        if let Some(c) = cookie {
            headers.insert("cookie".to_string(), c.to_string());
        }
        headers
    }

    fn json(res: &Response) -> Value {
        serde_json::from_slice(&res.body).unwrap()
    }

    fn session_cookie(res: &Response) -> String {
        let header = res.header("Set-Cookie").unwrap();
        header.split(';').next().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_register_then_authenticate() {
        let app = app().await;
        let res = app.register("reader@example.com").await;
        assert_eq!(res.status, 200);
        let body = json(&res);
        assert_eq!(body["email"], "reader@example.com");
        assert_eq!(body["passwd"], "******");
        assert!(session_cookie(&res).starts_with("awesession="));

        let form = format!("email=reader@example.com&passwd={}", sha1_hex("secret"));
        let res = app.post("/api/authenticate", &form, None).await;
        assert_eq!(res.status, 200);
        let cookie = session_cookie(&res);

        let res = app.get("/signin", Some(&cookie)).await;
        assert_eq!(res.body_text(), "signin Reader");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let app = app().await;
        app.register("reader@example.com").await;

        let res = app.register("reader@example.com").await;
        assert_eq!(res.status, 200);
        assert_eq!(json(&res)["error"], "register:failed");

        let res = app.register("not-an-email").await;
        let body = json(&res);
        assert_eq!(body["error"], "value:invalid");
        assert_eq!(body["data"], "email");

        let res = app.post("/api/users", "email=a@example.com&name=A", None).await;
        assert_eq!(res.status, 400);
        assert_eq!(res.body_text(), "Missing argument: passwd");
    }

    #[tokio::test]
    async fn test_authenticate_errors() {
        let app = app().await;
        app.register("reader@example.com").await;

        let res = app.post("/api/authenticate", "email=nobody@example.com&passwd=x", None).await;
        assert_eq!(json(&res)["message"], "Email not exist.");

        let res = app.post("/api/authenticate", "email=reader@example.com&passwd=wrong", None).await;
        let body = json(&res);
        assert_eq!(body["error"], "value:invalid");
        assert_eq!(body["data"], "passwd");
    }

    #[tokio::test]
    async fn test_manage_requires_admin() {
        let app = app().await;
        let res = app.get("/manage/blogs", None).await;
        assert_eq!(res.status, 302);
        assert_eq!(res.header("Location"), Some("/signin"));

        let cookie = app.admin_cookie().await;
        let res = app.get("/manage/blogs?page=3", Some(&cookie)).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_text(), "manage 3");

        let res = app.get("/manage/", Some(&cookie)).await;
        assert_eq!(res.status, 302);
        assert_eq!(res.header("Location"), Some("/manage/comments"));
    }

    #[tokio::test]
    async fn test_blog_lifecycle() {
        let app = app().await;
        let reader = session_cookie(&app.register("reader@example.com").await);
        let denied = app.post("/api/blogs", "name=T&summary=S&content=C", Some(&reader)).await;
        assert_eq!(json(&denied)["error"], "permission:forbidden");

        let admin = app.admin_cookie().await;
        let res = app.post("/api/blogs", "name=Hello&summary=S&content=Body", Some(&admin)).await;
        let blog = json(&res);
        assert_eq!(blog["user_name"], "Admin");
        let id = blog["id"].as_str().unwrap().to_string();

        let res = app.post(&format!("/api/blogs/{id}"), "name=Hello+again&summary=S&content=Body", Some(&admin)).await;
        assert_eq!(json(&res)["name"], "Hello again");

        let res = app.get(&format!("/blog/{id}"), None).await;
        assert_eq!(res.status, 200);
        assert_eq!(res.body_text(), "<h1>Hello again</h1><p>Body</p>0");

        let res = app.get("/", None).await;
        assert_eq!(res.body_text(), "[Hello again] page 1/1");

        let res = app
            .server
            .test_request(
                Method::Post,
                format!("/api/blogs/{id}/delete"),
                headers(Some("application/json"), Some(&admin)),
                Some(Bytes::from_static(b"{}")),
            )
            .await;
        assert_eq!(json(&res)["id"], id);

        let res = app.get(&format!("/api/blogs/{id}"), None).await;
        assert_eq!(json(&res)["error"], "value:notfound");
    }

    #[tokio::test]
    async fn test_blog_pagination() {
        let app = app().await;
        let admin = app.admin_cookie().await;
        for n in 0..12 {
            let form = format!("name=Post{n}&summary=S&content=C");
            app.post("/api/blogs", &form, Some(&admin)).await;
        }

        let body = json(&app.get("/api/blogs?page=2", None).await);
        assert_eq!(body["page"]["item_count"], 12);
        assert_eq!(body["page"]["page_count"], 2);
        assert_eq!(body["page"]["has_previous"], true);
        assert_eq!(body["blogs"].as_array().unwrap().len(), 2);

        let body = json(&app.get("/api/blogs?page=9", None).await);
        assert_eq!(body["blogs"].as_array().unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_comments_need_signin() {
        let app = app().await;
        let admin = app.admin_cookie().await;
        let blog = json(&app.post("/api/blogs", "name=B&summary=S&content=C", Some(&admin)).await);
        let path = format!("/api/blogs/{}/comments", blog["id"].as_str().unwrap());

        let res = app.post(&path, "content=hi", None).await;
        let body = json(&res);
        assert_eq!(body["error"], "permission:forbidden");
        assert_eq!(body["message"], "Please signin first.");

        let reader = session_cookie(&app.register("reader@example.com").await);
        let res = app.post(&path, "content=   ", Some(&reader)).await;
        assert_eq!(json(&res)["data"], "content");

        let res = app.get(&format!("{path}?content=nice"), Some(&reader)).await;
        assert_eq!(json(&res)["user_name"], "Reader");

        let body = json(&app.get("/api/comments", None).await);
        assert_eq!(body["page"]["item_count"], 1);

        let res = app.post("/api/blogs/missing/comments", "content=hi", Some(&reader)).await;
        assert_eq!(json(&res)["error"], "value:notfound");
    }

    #[tokio::test]
    async fn test_signout_clears_cookie() {
        let app = app().await;
        let mut h = headers(None, None);
        h.insert("referer".to_string(), "/blog/1".to_string());
        let res = app.server.test_request(Method::Get, "/signout", h, None).await;
        assert_eq!(res.status, 302);
        assert_eq!(res.header("Location"), Some("/blog/1"));
        assert!(res.header("Set-Cookie").unwrap().contains("Max-Age=0"));
    }

    #[tokio::test]
    async fn test_users_are_masked() {
        let app = app().await;
        app.register("reader@example.com").await;
        let body = json(&app.get("/api/users", None).await);
        assert_eq!(body["users"][0]["passwd"], "******");
    }
}
