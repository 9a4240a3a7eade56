mod common;

use axum::http::StatusCode;
use tokio_test::assert_ok;

use common::{
    body_string, csrf_field, location, post_cards, session_cookie, tiny_png, MultipartForm, TestApp,
};
use yatube::{
    csrf::CSRF_FAILED,
    forms::{INVALID_IMAGE, REQUIRED},
    handlers::auth::{INVALID_LOGIN, USERNAME_TAKEN},
    PostScope,
};

#[tokio::test]
async fn test_create_post_adds_one_post_and_redirects_to_profile() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let group = app.create_group("Тестовая группа", "test-slug").await;
    let cookie = app.login("leo").await;

    let before = app.store().count_posts(PostScope::All).await.unwrap();
    let form = MultipartForm::new()
        .text("text", "Тестовый пост")
        .text("group", &group.id.to_string());
    let response = app.post_multipart("/create/", form, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/leo/");
    assert_eq!(app.store().count_posts(PostScope::All).await.unwrap(), before + 1);

    let posts = app.store().list_posts(PostScope::All, 1, 0).await.unwrap();
    assert_eq!(posts[0].text, "Тестовый пост");
    assert_eq!(posts[0].author_id, author.id);
    assert_eq!(posts[0].group_id(), Some(group.id));
    assert_eq!(posts[0].image, None);
}

#[tokio::test]
async fn test_create_post_with_image_serves_it_from_media() {
    let app = TestApp::new();
    app.create_user("leo").await;
    let cookie = app.login("leo").await;

    let form = MultipartForm::new()
        .text("text", "Пост с картинкой")
        .text("group", "")
        .file("image", "small.png", "image/png", &tiny_png());
    let response = app.post_multipart("/create/", form, Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let post = app.store().list_posts(PostScope::All, 1, 0).await.unwrap().remove(0);
    let image = post.image.clone().expect("image stored");
    assert!(image.starts_with("posts/"));
    assert!(app.media_root.join(&image).exists());

    let response = app.get(&format!("/media/{}", image), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let detail = body_string(app.get(&format!("/posts/{}/", post.id), None).await).await;
    assert!(detail.contains(&format!("/media/{}", image)));
}

#[tokio::test]
async fn test_invalid_post_form_rerenders_with_errors() {
    let app = TestApp::new();
    app.create_user("leo").await;
    let cookie = app.login("leo").await;

    let form = MultipartForm::new()
        .text("text", "   ")
        .file("image", "notes.txt", "text/plain", b"not an image");
    let response = app.post_multipart("/create/", form, Some(&cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_string(response).await;
    assert!(html.contains(REQUIRED));
    assert!(html.contains(INVALID_IMAGE));
    assert_eq!(app.store().count_posts(PostScope::All).await.unwrap(), 0);
}

#[tokio::test]
async fn test_upload_with_image_header_but_garbage_body_is_rejected() {
    let app = TestApp::new();
    app.create_user("leo").await;
    let cookie = app.login("leo").await;

    let mut truncated = tiny_png();
    truncated.truncate(20);

    for (name, bytes) in [
        ("shell.gif", b"GIF89a<?php system($_GET['c']); ?>".to_vec()),
        ("cut.png", truncated),
    ] {
        let form = MultipartForm::new()
            .text("text", "Пост с поддельной картинкой")
            .file("image", name, "image/gif", &bytes);
        let response = app.post_multipart("/create/", form, Some(&cookie)).await;

        assert_eq!(response.status(), StatusCode::OK, "upload {}", name);
        assert!(body_string(response).await.contains(INVALID_IMAGE));
    }

    assert_eq!(app.store().count_posts(PostScope::All).await.unwrap(), 0);
    assert!(!app.media_root.join("posts").exists());
}

#[tokio::test]
async fn test_anonymous_create_redirects_to_login() {
    let app = TestApp::new();

    let response = app.get("/create/", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/create/");

    let form = MultipartForm::new().text("text", "Анонимный пост");
    let response = app.post_multipart("/create/", form, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/create/");
    assert_eq!(app.store().count_posts(PostScope::All).await.unwrap(), 0);
}

#[tokio::test]
async fn test_anonymous_edit_redirects_to_login() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let post = app.create_post(&author, "Исходный текст", None).await;
    let edit_url = format!("/posts/{}/edit/", post.id);

    let response = app.get(&edit_url, None).await;
    assert_eq!(location(&response), format!("/auth/login/?next={}", edit_url));

    let form = MultipartForm::new().text("text", "Изменённый текст");
    let response = app.post_multipart(&edit_url, form, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/auth/login/?next={}", edit_url));
    assert_eq!(app.store().get_post(post.id).await.unwrap().text, "Исходный текст");
}

#[tokio::test]
async fn test_non_author_edit_leaves_post_unchanged() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    app.create_user("intruder").await;
    let group = app.create_group("Группа", "group").await;
    let other_group = app.create_group("Другая группа", "other").await;
    let post = app.create_post(&author, "Исходный текст", Some(&group)).await;
    let cookie = app.login("intruder").await;

    let response = app.get(&format!("/posts/{}/edit/", post.id), Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let form = MultipartForm::new()
        .text("text", "Взломано")
        .text("group", &other_group.id.to_string());
    let response = app
        .post_multipart(&format!("/posts/{}/edit/", post.id), form, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let unchanged = app.store().get_post(post.id).await.unwrap();
    assert_eq!(unchanged.text, "Исходный текст");
    assert_eq!(unchanged.author_id, author.id);
    assert_eq!(unchanged.group_id(), Some(group.id));
}

#[tokio::test]
async fn test_author_edit_updates_post() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let group = app.create_group("Группа", "group").await;
    let post = app.create_post(&author, "Исходный текст", None).await;
    let cookie = app.login("leo").await;

    let page = app.get(&format!("/posts/{}/edit/", post.id), Some(&cookie)).await;
    assert_eq!(page.status(), StatusCode::OK);
    assert!(body_string(page).await.contains("Исходный текст"));

    let form = MultipartForm::new()
        .text("text", "Новый текст")
        .text("group", &group.id.to_string());
    let response = app
        .post_multipart(&format!("/posts/{}/edit/", post.id), form, Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let edited = app.store().get_post(post.id).await.unwrap();
    assert_eq!(edited.text, "Новый текст");
    assert_eq!(edited.group_id(), Some(group.id));
    assert_eq!(edited.pub_date, post.pub_date);
    assert_eq!(app.store().count_posts(PostScope::All).await.unwrap(), 1);
}

#[tokio::test]
async fn test_listings_split_into_pages() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    let reader = app.create_user("reader").await;
    let group = app.create_group("Группа", "paged").await;
    for i in 0..13 {
        app.create_post(&author, &format!("Пост номер {}", i), Some(&group)).await;
    }
    assert_ok!(app.store().create_follow(&reader, &author).await);
    let cookie = app.login("reader").await;

    for url in ["/group/paged/", "/profile/leo/", "/follow/"] {
        let first = body_string(app.get(url, Some(&cookie)).await).await;
        assert_eq!(post_cards(&first), 10, "first page of {}", url);

        let second = body_string(app.get(&format!("{}?page=2", url), Some(&cookie)).await).await;
        assert_eq!(post_cards(&second), 3, "second page of {}", url);
    }

    // The index is cached regardless of the page number
    let first = body_string(app.get("/", None).await).await;
    assert_eq!(post_cards(&first), 10);
    app.state.page_cache.clear();
    let second = body_string(app.get("/?page=2", None).await).await;
    assert_eq!(post_cards(&second), 3);
}

#[tokio::test]
async fn test_out_of_range_page_shows_last_page() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    for i in 0..13 {
        app.create_post(&author, &format!("Пост {}", i), None).await;
    }

    let html = body_string(app.get("/profile/leo/?page=99", None).await).await;
    assert_eq!(post_cards(&html), 3);

    let html = body_string(app.get("/profile/leo/?page=abc", None).await).await;
    assert_eq!(post_cards(&html), 10);
}

#[tokio::test]
async fn test_index_cache_hides_new_post_until_cleared() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    app.create_post(&author, "Старый пост", None).await;

    let before = body_string(app.get("/", None).await).await;
    assert!(before.contains("Старый пост"));

    app.create_post(&author, "Свежий пост", None).await;
    let cached = body_string(app.get("/", None).await).await;
    assert_eq!(cached, before);
    assert!(!cached.contains("Свежий пост"));

    app.state.page_cache.clear();
    let fresh = body_string(app.get("/", None).await).await;
    assert_eq!(fresh.matches("Свежий пост").count(), 1);
}

#[tokio::test]
async fn test_follow_is_idempotent_and_never_self() {
    let app = TestApp::new();
    let author = app.create_user("author").await;
    let follower = app.create_user("follower").await;
    let cookie = app.login("follower").await;

    for _ in 0..2 {
        let response = app.post_form("/profile/author/follow/", "", Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/profile/author/");
    }
    assert!(app.store().is_following(follower.id, author.id).await.unwrap());

    // A single unfollow removes the only edge
    let response = app.post_form("/profile/author/unfollow/", "", Some(&cookie)).await;
    assert_eq!(location(&response), "/profile/author/");
    assert!(!app.store().is_following(follower.id, author.id).await.unwrap());
    assert!(!app.store().delete_follow(follower.id, author.id).await.unwrap());

    let response = app.post_form("/profile/follower/follow/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/follower/");
    assert!(!app.store().is_following(follower.id, follower.id).await.unwrap());
}

#[tokio::test]
async fn test_unfollow_without_edge_is_noop() {
    let app = TestApp::new();
    app.create_user("author").await;
    app.create_user("follower").await;
    let cookie = app.login("follower").await;

    let response = app.post_form("/profile/author/unfollow/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile/author/");
}

#[tokio::test]
async fn test_anonymous_follow_redirects_to_login() {
    let app = TestApp::new();
    app.create_user("author").await;

    let response = app.post_form("/profile/author/follow/", "", None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login/?next=/profile/author/follow/");

    let response = app.get("/follow/", None).await;
    assert_eq!(location(&response), "/auth/login/?next=/follow/");
}

#[tokio::test]
async fn test_follow_feed_shows_only_followed_authors() {
    let app = TestApp::new();
    let followed = app.create_user("followed").await;
    let stranger = app.create_user("stranger").await;
    app.create_user("reader").await;
    app.create_user("loner").await;
    app.create_post(&followed, "Пост избранного автора", None).await;
    app.create_post(&stranger, "Пост постороннего автора", None).await;

    let reader_cookie = app.login("reader").await;
    app.post_form("/profile/followed/follow/", "", Some(&reader_cookie)).await;

    let feed = body_string(app.get("/follow/", Some(&reader_cookie)).await).await;
    assert!(feed.contains("Пост избранного автора"));
    assert!(!feed.contains("Пост постороннего автора"));

    let loner_cookie = app.login("loner").await;
    let feed = body_string(app.get("/follow/", Some(&loner_cookie)).await).await;
    assert_eq!(post_cards(&feed), 0);
}

#[tokio::test]
async fn test_profile_shows_follow_state() {
    let app = TestApp::new();
    app.create_user("author").await;
    app.create_user("reader").await;
    let cookie = app.login("reader").await;

    let html = body_string(app.get("/profile/author/", Some(&cookie)).await).await;
    assert!(html.contains("/profile/author/follow/"));

    app.post_form("/profile/author/follow/", "", Some(&cookie)).await;
    let html = body_string(app.get("/profile/author/", Some(&cookie)).await).await;
    assert!(html.contains("/profile/author/unfollow/"));

    let own = body_string(app.get("/profile/reader/", Some(&cookie)).await).await;
    assert!(!own.contains("/profile/reader/follow/"));
}

#[tokio::test]
async fn test_comment_is_attached_to_post_and_author() {
    let app = TestApp::new();
    let author = app.create_user("author").await;
    let commenter = app.create_user("commenter").await;
    let post = app.create_post(&author, "Пост для комментариев", None).await;
    let other = app.create_post(&author, "Другой пост", None).await;
    let cookie = app.login("commenter").await;

    let response = app
        .post_form(&format!("/posts/{}/comment/", post.id), "text=Отличный+пост", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    let comments = app.store().list_comments(post.id).await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].text, "Отличный пост");
    assert_eq!(comments[0].author_id, commenter.id);
    assert_eq!(comments[0].post_id, post.id);
    assert!(app.store().list_comments(other.id).await.unwrap().is_empty());

    let detail = body_string(app.get(&format!("/posts/{}/", post.id), None).await).await;
    assert!(detail.contains("Отличный пост"));
}

#[tokio::test]
async fn test_empty_or_anonymous_comments_are_dropped() {
    let app = TestApp::new();
    let author = app.create_user("author").await;
    let post = app.create_post(&author, "Пост", None).await;
    let url = format!("/posts/{}/comment/", post.id);

    let response = app.post_form(&url, "text=Аноним", None).await;
    assert_eq!(location(&response), format!("/auth/login/?next={}", url));

    let cookie = app.login("author").await;
    let response = app.post_form(&url, "text=+++", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/posts/{}/", post.id));

    assert!(app.store().list_comments(post.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_static_pages_and_health() {
    let app = TestApp::new();

    for url in ["/about/author/", "/about/tech/", "/auth/login/", "/auth/signup/", "/"] {
        let response = app.get(url, None).await;
        assert_eq!(response.status(), StatusCode::OK, "GET {}", url);
    }

    let response = app.get("/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
}

#[tokio::test]
async fn test_unknown_resources_answer_404() {
    let app = TestApp::new();
    let author = app.create_user("leo").await;
    app.create_post(&author, "Пост", None).await;

    for url in [
        "/posts/999/",
        "/posts/abc/",
        "/group/missing/",
        "/profile/nobody/",
        "/unexisting_page/",
    ] {
        let response = app.get(url, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "GET {}", url);
    }
}

#[tokio::test]
async fn test_signup_logs_new_user_in() {
    let app = TestApp::new();

    let body = "first_name=Lev&last_name=Tolstoy&username=leo&email=leo%40example.com\
                &password1=war-and-peace&password2=war-and-peace";
    let response = app.post_form("/auth/signup/", body, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");

    let cookie = session_cookie(&response).expect("session cookie");
    let response = app.get("/follow/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let user = app.store().get_user_by_username("leo").await.unwrap();
    assert_eq!(user.full_name(), "Lev Tolstoy");
    assert_ne!(user.password_hash, "war-and-peace");
}

#[tokio::test]
async fn test_signup_rejects_taken_username() {
    let app = TestApp::new();
    app.create_user("leo").await;

    let body = "username=leo&password1=war-and-peace&password2=war-and-peace";
    let response = app.post_form("/auth/signup/", body, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains(USERNAME_TAKEN));
}

#[tokio::test]
async fn test_login_follows_next_and_rejects_bad_password() {
    let app = TestApp::new();
    app.create_user("leo").await;

    let response = app
        .post_form("/auth/login/", "username=leo&password=wrong-password", None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_string(response).await.contains(INVALID_LOGIN));

    let body = format!("username=leo&password={}&next=%2Fcreate%2F", common::PASSWORD);
    let response = app.post_form("/auth/login/", &body, None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/create/");

    let body = format!("username=leo&password={}&next=https%3A%2F%2Fevil.example", common::PASSWORD);
    let response = app.post_form("/auth/login/", &body, None).await;
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    app.create_user("leo").await;
    let cookie = app.login("leo").await;

    assert_eq!(app.get("/create/", Some(&cookie)).await.status(), StatusCode::OK);

    let response = app.post_form("/auth/logout/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.get("/create/", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_state_changing_posts_require_csrf_token() {
    let app = TestApp::new();
    let author = app.create_user("author").await;
    let reader = app.create_user("reader").await;
    let post = app.create_post(&author, "Пост", None).await;
    let cookie = app.login("reader").await;

    let response = app
        .post_form_without_csrf("/profile/author/follow/", "", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(body_string(response).await.contains(CSRF_FAILED));
    assert!(!app.store().is_following(reader.id, author.id).await.unwrap());

    let url = format!("/posts/{}/comment/", post.id);
    let response = app
        .post_form_without_csrf(&url, "text=Подделка&csrf_token=forged", Some(&cookie))
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(app.store().list_comments(post.id).await.unwrap().is_empty());

    let response = app.post_form_without_csrf("/auth/logout/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.get("/create/", Some(&cookie)).await.status(), StatusCode::OK);

    // The same requests go through once they carry the session's token
    let response = app.post_form("/profile/author/follow/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(app.store().is_following(reader.id, author.id).await.unwrap());
}

#[tokio::test]
async fn test_login_without_csrf_token_is_rejected() {
    let app = TestApp::new();
    app.create_user("leo").await;

    let body = format!("username=leo&password={}", common::PASSWORD);
    let response = app.post_form_without_csrf("/auth/login/", &body, None).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(session_cookie(&response).is_none());
}

#[tokio::test]
async fn test_forms_embed_the_session_token() {
    let app = TestApp::new();
    let author = app.create_user("author").await;
    app.create_user("reader").await;
    let post = app.create_post(&author, "Пост", None).await;
    let cookie = app.login("reader").await;
    let (_, token) = app.csrf(Some(&cookie)).await;

    let profile = body_string(app.get("/profile/author/", Some(&cookie)).await).await;
    assert_eq!(csrf_field(&profile).as_deref(), Some(token.as_str()));

    let detail = body_string(app.get(&format!("/posts/{}/", post.id), Some(&cookie)).await).await;
    assert_eq!(csrf_field(&detail).as_deref(), Some(token.as_str()));

    // Anonymous pages without forms don't start a session
    let response = app.get(&format!("/posts/{}/", post.id), None).await;
    assert!(session_cookie(&response).is_none());
}
